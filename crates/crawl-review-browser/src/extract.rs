//! DOM extraction and scroll-strategy scripts, per spec.md §4.3.1/§4.3.2.
//! These run inside the page via `Page::eval`; the Rust side only
//! deserializes the JSON array they return.

use serde::Deserialize;

/// One candidate review as extracted in-page, before rating-range
/// filtering and cross-locale de-duplication.
#[derive(Debug, Clone, Deserialize)]
pub struct RawExtractedReview {
    pub id: String,
    pub title: String,
    pub rating: Option<u8>,
    pub date: Option<String>,
    pub author: String,
    pub content: String,
}

/// Evaluated in-page. Tries each selector strategy in priority order,
/// stopping at the first that yields candidates (spec.md §4.3.1), and
/// drops candidates whose content is under 10 characters.
pub const EXTRACT_REVIEWS_SCRIPT: &str = r#"
() => {
  const strategies = [
    () => Array.from(document.querySelectorAll('article[aria-labelledby^="review-"]')),
    () => Array.from(document.querySelectorAll('[class*="review"]'))
      .filter(el => el.innerText && el.innerText.length > 50 && el.children.length > 0),
    () => Array.from(document.querySelectorAll('[aria-label*="star" i], figure[role="img"]'))
      .map(star => {
        let el = star;
        for (let i = 0; i < 5 && el; i++) {
          if (el.innerText && el.innerText.length > 50) return el;
          el = el.parentElement;
        }
        return null;
      })
      .filter(Boolean),
    () => Array.from(document.querySelectorAll('.review-header'))
      .map(h => h.closest('article') || h.parentElement)
      .filter(Boolean),
    () => Array.from(document.querySelectorAll('ol.stars[aria-label*="Star"]'))
      .map(ol => ol.closest('article') || ol.parentElement)
      .filter(Boolean),
  ];

  let candidates = [];
  for (const strategy of strategies) {
    candidates = strategy();
    if (candidates.length > 0) break;
  }

  const seenPrefixes = new Set();
  const out = [];
  for (const el of candidates) {
    const titleEl = el.querySelector('h1,h2,h3,[class*="title"]');
    const title = titleEl ? titleEl.innerText.trim() : '';

    let rating = null;
    const starsContainer = el.querySelector('[aria-label*="star" i], ol.stars');
    const ariaLabel = starsContainer ? starsContainer.getAttribute('aria-label') : null;
    if (ariaLabel) {
      const m = ariaLabel.match(/(\d+)/);
      if (m) rating = parseInt(m[1], 10);
    }
    if (rating === null) {
      const anyLabel = el.querySelector('[aria-label*="Star"]');
      if (anyLabel) {
        const m = anyLabel.getAttribute('aria-label').match(/(\d+)\s*Stars?/);
        if (m) rating = parseInt(m[1], 10);
      }
    }
    if (rating === null) {
      const filled = el.querySelectorAll('[class*="star-filled"], [class*="filled-star"]').length;
      if (filled >= 1 && filled <= 5) rating = filled;
    }

    const timeEl = el.querySelector('time');
    const date = timeEl ? timeEl.getAttribute('datetime') : null;

    const authorEl = el.querySelector('p.author, [class*="author"]');
    const author = authorEl ? authorEl.innerText.trim() : '';

    const contentEl = el.querySelector('p[class*="content"], .review-text, p');
    const content = contentEl ? contentEl.innerText.trim() : '';
    if (content.length < 10) continue;

    const prefix = content.slice(0, 100);
    if (seenPrefixes.has(prefix)) continue;
    seenPrefixes.add(prefix);

    const id = el.getAttribute('aria-labelledby') || `synthetic-${out.length}-${Date.now()}`;
    out.push({ id, title, rating, date, author, content });
  }
  return out;
}
"#;

/// Evaluated in-page. Probes modal selectors first; scrolls the modal if
/// it is scrollable and review-bearing, otherwise falls back to scrolling
/// the document (spec.md §4.3.2).
pub const SCROLL_SCRIPT: &str = r#"
() => {
  const modalSelectors = [
    '[role="dialog"]', '[aria-modal="true"]', '[role="dialog"] [class*="scroll"]',
  ];
  for (const sel of modalSelectors) {
    const el = document.querySelector(sel);
    if (!el) continue;
    const scrollable = el.scrollHeight > el.clientHeight;
    const holdsReviews = el.querySelector('article[aria-labelledby^="review-"]') !== null
      || el.closest('[role="dialog"]') !== null;
    if (scrollable && holdsReviews) {
      el.scrollTop += el.clientHeight * 0.8;
      return true;
    }
  }
  window.scrollBy({ top: window.innerHeight * 1.5, behavior: 'smooth' });
  window.scrollTo(0, document.body.scrollHeight);
  document.body.dispatchEvent(new KeyboardEvent('keydown', { key: 'End' }));
  return false;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_non_empty_function_expressions() {
        assert!(EXTRACT_REVIEWS_SCRIPT.trim().starts_with("()"));
        assert!(SCROLL_SCRIPT.trim().starts_with("()"));
    }
}
