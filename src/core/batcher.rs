use crate::domain::model::Batch;
use std::collections::HashSet;

/// Trims values, drops blanks and keeps the first occurrence of each number.
pub fn dedupe<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|value| {
            let value = value.as_ref().trim();
            (!value.is_empty() && seen.insert(value.to_string())).then(|| value.to_string())
        })
        .collect()
}

/// Splits numbers into batches of at most `batch_size`, keeping order.
pub fn into_batches(numbers: &[String], batch_size: usize) -> Vec<Batch> {
    numbers
        .chunks(batch_size.max(1))
        .filter_map(|chunk| Batch::new(chunk.to_vec()))
        .collect()
}
