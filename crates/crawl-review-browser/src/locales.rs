//! Priority locale list and cap-scaled sweep sizing, per spec.md §4.3
//! ("Locale strategy"). Grounded on the `COUNTRIES` ordering in
//! `original_source/crawl-service/crawlers/app_store_browser.py`.

/// Up to 15 additional storefronts visited, in fixed order, after the
/// caller's primary locale.
pub const PRIORITY_LOCALES: &[&str] = &[
    "gb", "ca", "au", "de", "fr", "jp", "cn", "kr", "br", "in", "it", "es", "mx", "nl", "ru",
];

/// How many locales (including the primary) to visit for a given cap, per
/// spec.md §4.3: `cap >= 3000 -> 16, >= 1500 -> 12, else 8`. Only called
/// when the sweep is eligible at all (`multi_locale && cap > 100`).
pub fn locale_count_for_cap(cap: u32) -> usize {
    if cap >= 3000 {
        16
    } else if cap >= 1500 {
        12
    } else {
        8
    }
}

/// Builds the ordered locale sweep: `primary_locale` first, then as many
/// `PRIORITY_LOCALES` entries (skipping a duplicate of the primary) as the
/// cap-scaled count allows.
pub fn build_locale_sweep(primary_locale: &str, multi_locale: bool, cap: u32) -> Vec<String> {
    if !multi_locale || cap <= 100 {
        return vec![primary_locale.to_string()];
    }
    let total = locale_count_for_cap(cap);
    let mut sweep = vec![primary_locale.to_string()];
    for locale in PRIORITY_LOCALES {
        if sweep.len() >= total {
            break;
        }
        if *locale != primary_locale {
            sweep.push(locale.to_string());
        }
    }
    sweep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_locale_path_when_not_multi_locale() {
        assert_eq!(build_locale_sweep("us", false, 5000), vec!["us"]);
    }

    #[test]
    fn single_locale_path_when_cap_at_or_below_100() {
        assert_eq!(build_locale_sweep("us", true, 100), vec!["us"]);
    }

    #[test]
    fn scales_locale_count_with_cap() {
        assert_eq!(build_locale_sweep("us", true, 3000).len(), 16);
        assert_eq!(build_locale_sweep("us", true, 1500).len(), 12);
        assert_eq!(build_locale_sweep("us", true, 500).len(), 8);
    }

    #[test]
    fn primary_locale_not_duplicated_when_also_a_priority_locale() {
        let sweep = build_locale_sweep("gb", true, 5000);
        assert_eq!(sweep.iter().filter(|l| *l == "gb").count(), 1);
    }
}
