//! Task identifiers: a readable slug of the task name plus a random suffix.
//!
//! `"Book flights to Oslo"` becomes something like
//! `book-flights-to-oslo-3f9a0c12`. A name with no ASCII letters or digits
//! becomes `task-3f9a0c12`. The store retries on the rare collision.

use rand::Rng;

/// Maximum slug length before the suffix.
const MAX_SLUG_LEN: usize = 40;

/// Lowercase ASCII words of `name` joined by hyphens.
///
/// Whole words are kept while they fit in `max_len` bytes; a first word
/// longer than that is cut.
#[must_use]
pub fn slugify(name: &str, max_len: usize) -> String {
    let mut slug = String::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        if slug.is_empty() {
            // Words are pure ASCII, so any byte index is a char boundary.
            slug.push_str(&word[..word.len().min(max_len)]);
        } else if slug.len() + 1 + word.len() <= max_len {
            slug.push('-');
            slug.push_str(word);
        } else {
            break;
        }
    }
    slug.make_ascii_lowercase();
    slug
}

/// Generate an identifier for a task called `name`, drawing the suffix
/// from `rng`.
#[must_use]
pub fn generate_task_id<R: Rng + ?Sized>(name: &str, rng: &mut R) -> String {
    let suffix: u32 = rng.gen();
    match slugify(name, MAX_SLUG_LEN) {
        slug if slug.is_empty() => format!("task-{suffix:08x}"),
        slug => format!("{slug}-{suffix:08x}"),
    }
}
