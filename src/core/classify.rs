use crate::domain::model::{OutputRow, RawResult, Verdict};

fn is_null_like(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => true,
        Some(v) => v.is_empty() || v.eq_ignore_ascii_case("null"),
    }
}

/// `FALSE` when the caller name mentions fraud, or when neither a caller
/// name nor a portability city is known.
pub fn verdict(result: &RawResult) -> Verdict {
    let enrichment = result.enrichment();
    let caller_name = enrichment
        .and_then(|e| e.caller_name.as_ref())
        .and_then(|c| c.caller_name.as_deref());
    let city = enrichment
        .and_then(|e| e.portability.as_ref())
        .and_then(|p| p.city.as_deref());

    let mentions_fraud = caller_name
        .map(|name| name.to_lowercase().contains("fraud"))
        .unwrap_or(false);

    if mentions_fraud || (is_null_like(caller_name) && is_null_like(city)) {
        Verdict::False
    } else {
        Verdict::True
    }
}

pub fn classify(result: &RawResult) -> OutputRow {
    let enrichment = result.enrichment();
    let carrier = enrichment.and_then(|e| e.carrier.as_ref());
    let portability = enrichment.and_then(|e| e.portability.as_ref());

    OutputRow {
        original: result.original.clone(),
        is_valid: verdict(result),
        formatted_number: result.formatted_number.clone(),
        number_type: result.number_type.clone(),
        region_code: result.region_code.clone(),
        country_code: enrichment.and_then(|e| e.country_code.clone()),
        carrier_name: carrier.and_then(|c| c.name.clone()),
        line_type: carrier.and_then(|c| c.line_type.clone()),
        caller_name: enrichment
            .and_then(|e| e.caller_name.as_ref())
            .and_then(|c| c.caller_name.clone()),
        city: portability.and_then(|p| p.city.clone()),
        state: portability.and_then(|p| p.state.clone()),
    }
}

pub fn classify_all(results: &[RawResult]) -> Vec<OutputRow> {
    results.iter().map(classify).collect()
}
