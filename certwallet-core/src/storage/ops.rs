//! List mutations shared by the store implementations.

use super::error::{StorageError, StorageResult};
use crate::item::{ItemMatcher, RawItem};

pub(crate) fn insert_front(items: &mut Vec<RawItem>, item: RawItem) -> bool {
    let matcher = item.matcher();
    if items.iter().any(|existing| matcher.matches(existing)) {
        return false;
    }
    items.insert(0, item);
    true
}

pub(crate) fn delete(items: &mut Vec<RawItem>, matcher: &ItemMatcher) -> bool {
    let before = items.len();
    items.retain(|item| !matcher.matches(item));
    items.len() != before
}

/// Replaces in place. If `item` duplicates another stored entry, that other
/// entry is dropped so identities stay unique.
pub(crate) fn replace(items: &mut Vec<RawItem>, matcher: &ItemMatcher, item: RawItem) -> bool {
    let Some(position) = items.iter().position(|existing| matcher.matches(existing)) else {
        return false;
    };
    let replacement = item.matcher();
    items[position] = item;
    let mut index = 0;
    items.retain(|existing| {
        let keep = index == position || !replacement.matches(existing);
        index += 1;
        keep
    });
    true
}

pub(crate) fn reorder(items: &mut Vec<RawItem>, from: usize, to: usize) -> StorageResult<()> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(StorageError::IndexOutOfRange {
                index: index as u64,
                len: len as u64,
            });
        }
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}
