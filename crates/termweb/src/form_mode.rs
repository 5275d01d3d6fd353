//! C8 — FormMode: a single CDP DOM query discovers the page's focusable
//! elements, Tab cycles the viewer's cursor through them (refocusing the
//! DOM element each step), Enter activates the one currently selected.

use serde_json::Value;
use termweb_cdp::{protocol, CdpClient, CdpError};

/// Matches anything a keyboard user could reasonably Tab to: links,
/// buttons, form controls, and explicit `tabindex`/`role="button"` opt-ins.
const DISCOVER_SCRIPT: &str = r#"(function() {
  var nodes = Array.prototype.slice.call(document.querySelectorAll(
    'a[href], button, input, textarea, select, [role="button"], [tabindex]:not([tabindex="-1"])'
  ));
  window.__termwebFormElements = nodes;
  return nodes.map(function(el) {
    return { tag: el.tagName.toLowerCase(), type: (el.getAttribute('type') || '').toLowerCase() };
  });
})()"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormElement {
    pub index: usize,
    pub tag: String,
    pub kind: String,
}

impl FormElement {
    /// Whether activating this element should focus it for typed input
    /// (transitioning to `TextInput`) rather than clicking it in place.
    pub fn is_text_entry(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
            && !matches!(self.kind.as_str(), "checkbox" | "radio" | "button" | "submit" | "reset")
    }
}

/// Runs the discovery query and caches the resulting node list on
/// `window.__termwebFormElements` so later focus/activate calls can
/// address an element by index without re-querying the DOM.
pub fn discover(client: &CdpClient) -> Result<Vec<FormElement>, CdpError> {
    let result = protocol::runtime_evaluate(client, DISCOVER_SCRIPT)?;
    let items = result
        .pointer("/result/value")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let tag = item.get("tag")?.as_str()?.to_string();
            let kind = item.get("type").and_then(Value::as_str).unwrap_or("").to_string();
            Some(FormElement { index, tag, kind })
        })
        .collect())
}

pub fn focus_element(client: &CdpClient, index: usize) -> Result<(), CdpError> {
    let script = format!(
        "(function(){{ var el=(window.__termwebFormElements||[])[{index}]; if (el) {{ el.focus(); el.scrollIntoView({{block:'center'}}); }} }})()"
    );
    protocol::runtime_evaluate(client, &script)?;
    Ok(())
}

/// Activates the element at `index`: a click for link/button/radio/
/// checkbox-shaped elements, a focus (no click) for text-entry ones so the
/// caller can transition to `TextInput` and route subsequent keys there.
pub fn activate_element(client: &CdpClient, element: &FormElement) -> Result<(), CdpError> {
    let script = if element.is_text_entry() {
        format!("(function(){{ var el=(window.__termwebFormElements||[])[{}]; if (el) el.focus(); }})()", element.index)
    } else {
        format!("(function(){{ var el=(window.__termwebFormElements||[])[{}]; if (el) el.click(); }})()", element.index)
    };
    protocol::runtime_evaluate(client, &script)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_inputs_are_text_entry() {
        let el = FormElement { index: 0, tag: "input".to_string(), kind: "text".to_string() };
        assert!(el.is_text_entry());
    }

    #[test]
    fn checkbox_inputs_are_not_text_entry() {
        let el = FormElement { index: 0, tag: "input".to_string(), kind: "checkbox".to_string() };
        assert!(!el.is_text_entry());
    }

    #[test]
    fn buttons_are_not_text_entry() {
        let el = FormElement { index: 0, tag: "button".to_string(), kind: String::new() };
        assert!(!el.is_text_entry());
    }

    #[test]
    fn textarea_is_text_entry() {
        let el = FormElement { index: 2, tag: "textarea".to_string(), kind: String::new() };
        assert!(el.is_text_entry());
    }
}
