/// Tower middleware for the API server
///
/// Authentication lives in `pactrack_shared::auth::middleware` so the
/// storage-backed user lookup stays next to the token code.

pub mod security;
