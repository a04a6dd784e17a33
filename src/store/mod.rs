//! Persistence: Supabase REST client and match recording

pub mod matches;
pub mod supabase;

pub use matches::{MatchRecorder, RetryPolicy};
pub use supabase::SupabaseClient;
