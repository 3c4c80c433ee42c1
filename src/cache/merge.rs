// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Recursive merge of JSON documents.

use serde_json::Value;

/// Merges `source` into `target`.
///
/// * Objects are merged key by key, recursively. Keys only present in
///   `target` are kept.
/// * Arrays are merged index by index, recursively. The result is as long as
///   the longer of the two.
/// * Any other source value, `null` included, replaces the target value.
pub(crate) fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (index, value) in source.into_iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value),
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_wins_and_target_only_keys_survive() {
        let mut target = json!({ "id": 100, "filePath": "/a.mp3", "name": "local" });
        deep_merge(&mut target, json!({ "id": 777, "name": "remote" }));

        assert_eq!(target, json!({ "id": 777, "filePath": "/a.mp3", "name": "remote" }));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let mut target = json!({ "album": { "name": "Local", "picUrl": null, "year": 1999 } });
        deep_merge(
            &mut target,
            json!({ "album": { "name": "Remote", "picUrl": "http://pic" } }),
        );

        assert_eq!(
            target,
            json!({ "album": { "name": "Remote", "picUrl": "http://pic", "year": 1999 } })
        );
    }

    #[test]
    fn arrays_merge_by_index() {
        let mut target = json!({ "artists": [{ "name": "A", "local": true }] });
        deep_merge(
            &mut target,
            json!({ "artists": [{ "name": "B" }, { "name": "C" }] }),
        );

        assert_eq!(
            target,
            json!({ "artists": [{ "name": "B", "local": true }, { "name": "C" }] })
        );
    }

    #[test]
    fn shorter_source_array_keeps_trailing_elements() {
        let mut target = json!([1, 2, 3]);
        deep_merge(&mut target, json!([9]));

        assert_eq!(target, json!([9, 2, 3]));
    }

    #[test]
    fn mismatched_types_are_replaced() {
        let mut target = json!({ "album": "unknown", "alia": ["x"] });
        deep_merge(&mut target, json!({ "album": { "id": 1 }, "alia": null }));

        assert_eq!(target, json!({ "album": { "id": 1 }, "alia": null }));
    }
}
