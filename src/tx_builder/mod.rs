//! Transaction builder
//!
//! Produces the two halves of every bundle:
//! - **tip**: Jito tip account pool, random collector selection, SOL amount parsing
//! - **bundle**: signed tip transfer and the `[tip, primary]` pair with its wire encoding
//! - **swap**: the primary (sell) transaction producer and sell sizing
//! - **errors**: error taxonomy shared by the above
//!
//! The tip transfer is cheap and rebuilt per attempt. The swap is built once
//! per checkpoint and reused.

pub mod errors;
pub use errors::TransactionBuilderError;

pub mod bundle;
pub mod swap;
pub mod tip;

pub use bundle::{build_fee_transaction, Bundle, BundleEncoding, SignedFeeTransaction};
pub use swap::{
    compute_sell_amount, effective_sell_percent, resign_with_checkpoint, RaydiumSwapProducer,
    SellRequest, SwapProducer, SELL_PERCENT_FLOOR, WSOL_MINT,
};
pub use tip::{parse_sol_amount, TipAccountPool, JITO_TIP_ACCOUNTS};
