mod state;

pub use state::{
    BatchReason, Decision, DocumentState, HunkBatch, PassTicket, Result, ReviewError,
    ReviewState, Undone,
};
