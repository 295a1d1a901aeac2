// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures used throughout the service, grouped by resource:
//
// - api:      response envelope, pagination, health responses
// - user:     accounts, roles, auth request bodies
// - product:  catalogue entries, reviews, listing queries
// - order:    order snapshots, addresses, payment state
// - catalog:  categories and coupons (admin reference data)
//
// Database rows and API shapes share structs where they line up; wire names
// are camelCase to match the storefront client.
// =============================================================================

pub mod api;
pub mod catalog;
pub mod order;
pub mod product;
pub mod user;

pub use api::*;
pub use catalog::*;
pub use order::*;
pub use product::*;
pub use user::*;

/// Lower-case `text`, replace everything outside `[a-z0-9]` with `-`,
/// collapse repeated dashes and trim them from both ends.
///
/// Returns an empty string when nothing usable is left.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
