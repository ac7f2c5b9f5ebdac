//! Authentication adapters.
//!
//! - `supabase` - validates Supabase access tokens and resolves the user
//!
//! Tests use `adapters::memory::StaticSessionValidator`.

mod supabase;

pub use supabase::{SupabaseConfig, SupabaseSessionValidator, DEFAULT_AUDIENCE};
