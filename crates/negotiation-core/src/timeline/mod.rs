pub mod receipts;

pub use receipts::{
    receipt_timeline, run_timeline, MonthlyReceipts, Receipt, ReceiptTimeline, TimelineInput,
};
