use log::warn;

use crate::codec;
use crate::error::StoreError;
use crate::store::{normalize_key, DbStore};

/// Scanning stops once more than this many qualifying candidates have been
/// collected. Bounds worst-case work on pathological inputs at the cost of
/// possibly missing a better match later in key order; accepted trade-off.
const MAX_CANDIDATES: usize = 10;

/// At most this many suggestions are returned.
const MAX_RESULTS: usize = 3;

/// Record field holding the frequency rank of a headword. Lower values mean
/// more frequent words.
pub const FREQUENCY_FIELD: &str = "frq";

struct Candidate {
    word: String,
    rank: i64,
    len: usize,
}

/// Scan the whole store for headwords within `max_distance` edits of `term`
/// and return up to three of them, best first.
///
/// The distance threshold is static for the entire scan; finding a closer
/// candidate does not narrow it for the keys that follow. Exact matches
/// (distance 0) never qualify: this path only runs after an exact lookup
/// has already missed, and callers must not use it to find exact matches.
///
/// Candidates are pruned by length before any distance is computed, since
/// the length difference lower-bounds the edit distance. Survivors are
/// ranked by ascending frequency rank (a missing or non-numeric `frq`
/// field ranks as 0 rather than dropping the candidate), with longer words
/// winning ties. An entry whose value fails to decode is logged and
/// skipped; it never aborts the scan.
pub fn find_similar(
    store: &DbStore,
    term: &str,
    max_distance: usize,
) -> Result<Vec<String>, StoreError> {
    let term = normalize_key(term);
    let term_len = term.chars().count();
    let mut candidates: Vec<Candidate> = Vec::new();

    for entry in store.scan_all()? {
        if candidates.len() > MAX_CANDIDATES {
            break;
        }
        let (word, raw) = entry?;

        let word_len = word.chars().count();
        if word_len.abs_diff(term_len) > max_distance {
            continue;
        }

        let distance = levenshtein(&term, &word);
        if distance == 0 || distance > max_distance {
            continue;
        }

        let record = match codec::decode(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping undecodable entry '{word}' during suggestion scan: {err}");
                continue;
            }
        };
        let rank = record
            .get(FREQUENCY_FIELD)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(0);

        candidates.push(Candidate {
            word,
            rank,
            len: word_len,
        });
    }

    // Lower rank value first (more frequent), longer word first on ties.
    candidates.sort_by(|a, b| a.rank.cmp(&b.rank).then(b.len.cmp(&a.len)));
    candidates.truncate(MAX_RESULTS);

    Ok(candidates.into_iter().map(|c| c.word).collect())
}

/// Levenshtein edit distance (unit-cost insert/delete/substitute) over
/// chars, using the classic two-row dynamic program.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Record;
    use crate::store::StoreConfig;
    use tempfile::TempDir;

    fn seed(entries: &[(&str, &str)]) -> (TempDir, DbStore) {
        let dir = TempDir::new().unwrap();
        let store = DbStore::open(StoreConfig::new(dir.path().join("store"))).unwrap();
        for (word, frq) in entries {
            let mut record = Record::new();
            if !frq.is_empty() {
                record.insert(FREQUENCY_FIELD.to_string(), frq.to_string());
            }
            store.put(word, &record).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("apple", "apply"), 1);
        assert_eq!(levenshtein("develp", "develop"), 1);
    }

    #[test]
    fn excludes_exact_matches() {
        let (_dir, store) = seed(&[("apple", "10"), ("apply", "20")]);
        let got = find_similar(&store, "apple", 1).unwrap();
        assert_eq!(got, ["apply"]);
    }

    #[test]
    fn ranks_by_frequency_then_length() {
        let (_dir, store) = seed(&[("devel", "70"), ("develop", "100")]);
        let got = find_similar(&store, "develp", 2).unwrap();
        assert_eq!(got, ["devel", "develop"]);
    }

    #[test]
    fn longer_word_wins_frequency_ties() {
        let (_dir, store) = seed(&[("cat", "50"), ("chart", "50")]);
        let got = find_similar(&store, "cart", 1).unwrap();
        assert_eq!(got, ["chart", "cat"]);
    }

    #[test]
    fn missing_frequency_ranks_as_most_frequent() {
        let (_dir, store) = seed(&[("card", "50"), ("cart", "")]);
        let got = find_similar(&store, "carf", 1).unwrap();
        assert_eq!(got, ["cart", "card"]);
    }

    #[test]
    fn caps_results_at_three() {
        let (_dir, store) = seed(&[
            ("cara", "1"),
            ("carb", "2"),
            ("carc", "3"),
            ("card", "4"),
            ("care", "5"),
        ]);
        let got = find_similar(&store, "carf", 1).unwrap();
        assert_eq!(got.len(), 3);
        for word in &got {
            assert_eq!(levenshtein("carf", word), 1);
        }
    }

    #[test]
    fn scan_stops_after_candidate_cap_even_if_better_match_comes_later() {
        // Twelve distance-1 candidates in key byte order; the scan breaks
        // once the eleventh has been collected, so "carl" — the best-ranked
        // of them all — is never even considered.
        let entries: Vec<(String, String)> = "abcdefghijkl"
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let rank = if c == 'l' { 1 } else { 20 + i as i64 };
                (format!("car{c}"), rank.to_string())
            })
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(w, r)| (w.as_str(), r.as_str()))
            .collect();
        let (_dir, store) = seed(&borrowed);

        let got = find_similar(&store, "carm", 1).unwrap();
        assert!(!got.contains(&"carl".to_string()));
        // Best three of the eleven candidates actually scanned.
        assert_eq!(got, ["cara", "carb", "carc"]);
    }

    #[test]
    fn length_pruning_never_admits_out_of_band_keys() {
        let (_dir, store) = seed(&[("cat", "10"), ("catalogue", "1")]);
        let got = find_similar(&store, "cart", 1).unwrap();
        assert_eq!(got, ["cat"]);
    }

    #[test]
    fn respects_max_distance() {
        let (_dir, store) = seed(&[("apple", "10")]);
        assert!(find_similar(&store, "apzzz", 1).unwrap().is_empty());
        assert_eq!(find_similar(&store, "appze", 2).unwrap(), ["apple"]);
    }

    #[test]
    fn skips_undecodable_entries() {
        let (_dir, store) = seed(&[("apply", "20")]);
        store.put_raw_for_tests("appla", vec![0xff; 9]);
        let got = find_similar(&store, "apple", 1).unwrap();
        assert_eq!(got, ["apply"]);
    }

    #[test]
    fn normalizes_query_term() {
        let (_dir, store) = seed(&[("apply", "20")]);
        let got = find_similar(&store, "  APPLE ", 1).unwrap();
        assert_eq!(got, ["apply"]);
    }
}
