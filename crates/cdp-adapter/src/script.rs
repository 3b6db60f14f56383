//! Page-side scripts for anchors CSS cannot express.
//!
//! Text and ARIA anchors are matched by a small script that stamps the first
//! hit with a one-off marker attribute; the element is then fetched through
//! the ordinary CSS path using that marker.

use serde_json::Value;

/// Attribute stamped onto elements matched by script.
pub(crate) const MARKER_ATTR: &str = "data-swapbot-ref";

pub(crate) fn marker_selector(marker: &str) -> String {
    format!("[{}=\"{}\"]", MARKER_ATTR, marker)
}

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Stamp the first `tag` element whose whitespace-normalized text contains
/// `content`. Evaluates to `true` on a match.
pub(crate) fn tag_by_text(tag: &str, content: &str, marker: &str) -> String {
    format!(
        r#"(() => {{
  const needle = {needle};
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  for (const el of document.querySelectorAll({tag})) {{
    if (norm(el.innerText || el.textContent).includes(needle)) {{
      el.setAttribute({attr}, {marker});
      return true;
    }}
  }}
  return false;
}})()"#,
        needle = quote(content.trim()),
        tag = quote(tag),
        attr = quote(MARKER_ATTR),
        marker = quote(marker),
    )
}

/// Stamp the first element carrying `role` (explicitly or through its tag)
/// whose accessible label contains `name`.
pub(crate) fn tag_by_role(role: &str, name: &str, marker: &str) -> String {
    format!(
        r#"(() => {{
  const needle = {needle};
  const implicit = {{ button: 'button', link: 'a[href]', textbox: 'input:not([type]), input[type="text"], input[type="number"], textarea', searchbox: 'input[type="search"]' }};
  const role = {role};
  const query = `[role="${{role}}"]` + (implicit[role] ? `, ${{implicit[role]}}` : '');
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const label = (el) => norm(el.getAttribute('aria-label') || el.innerText || el.getAttribute('placeholder') || el.getAttribute('title'));
  for (const el of document.querySelectorAll(query)) {{
    if (label(el).includes(needle)) {{
      el.setAttribute({attr}, {marker});
      return true;
    }}
  }}
  return false;
}})()"#,
        needle = quote(name.trim()),
        role = quote(role),
        attr = quote(MARKER_ATTR),
        marker = quote(marker),
    )
}

/// Focus the element and select its content, so typing replaces it.
pub(crate) const SELECT_ALL_FN: &str = r#"function() {
  this.focus();
  if (typeof this.select === 'function') {
    this.select();
    return;
  }
  const range = document.createRange();
  range.selectNodeContents(this);
  const selection = window.getSelection();
  selection.removeAllRanges();
  selection.addRange(range);
}"#;

pub(crate) const READY_STATE: &str = "document.readyState";

/// Hides the automation flag before any page script runs.
pub(crate) const WEBDRIVER_OVERRIDE: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";
