use crate::error::SearchError;
use shardscan_core::ShardHandle;
use std::borrow::Cow;

/// Contiguous numbering: shard `i` starts after all rows of shards `0..i`.
pub fn prefix_offsets(shards: &[ShardHandle]) -> Result<Vec<i64>, SearchError> {
    let mut offsets = Vec::with_capacity(shards.len());
    let mut total: i64 = 0;
    for (shard, handle) in shards.iter().enumerate() {
        offsets.push(total);
        total = i64::try_from(handle.rows())
            .ok()
            .and_then(|rows| total.checked_add(rows))
            .ok_or(SearchError::TranslationOverflow { shard })?;
    }
    Ok(offsets)
}

/// Uses the caller's table when given, otherwise derives the contiguous one.
///
/// A supplied offset must be non-negative and leave room for every row of
/// its shard in `i64`, so no translated label can collide with the `-1`
/// sentinel or overflow during the merge.
pub fn resolve<'a>(
    shards: &[ShardHandle],
    supplied: Option<&'a [i64]>,
) -> Result<Cow<'a, [i64]>, SearchError> {
    match supplied {
        Some(table) => {
            if table.len() != shards.len() {
                return Err(SearchError::TranslationLength {
                    expected: shards.len(),
                    got: table.len(),
                });
            }
            for (shard, (&offset, handle)) in table.iter().zip(shards).enumerate() {
                if offset < 0 {
                    return Err(SearchError::NegativeTranslation { shard, offset });
                }
                i64::try_from(handle.rows())
                    .ok()
                    .and_then(|rows| offset.checked_add(rows))
                    .ok_or(SearchError::TranslationOverflow { shard })?;
            }
            tracing::debug!(translations = ?table, "using supplied translations");
            Ok(Cow::Borrowed(table))
        }
        None => {
            let derived = prefix_offsets(shards)?;
            tracing::debug!(translations = ?derived, "derived contiguous translations");
            Ok(Cow::Owned(derived))
        }
    }
}
