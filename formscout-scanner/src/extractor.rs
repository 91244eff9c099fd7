//! Turning `<form>` elements into [`FormStructure`]s.

use crate::driver::PageHandle;
use crate::locator::collapse_whitespace;
use crate::result::{FieldKind, FormField, FormStructure};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::{debug, warn};

const SKIPPED_TYPES: &[&str] = &["hidden", "submit", "button", "image"];

/// Elements whose text belongs to a control rather than to a label.
const NON_LABEL_TAGS: &[&str] = &["select", "option", "textarea", "script", "style"];

const GROUP_CAPTION_TAGS: &[&str] = &["label", "span", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6"];

const MAX_CAPTION_CHARS: usize = 199;

struct Control<'a> {
    element: ElementRef<'a>,
    kind: FieldKind,
    name: String,
}

/// Every form in the document, in document order.
pub fn extract_forms_from_html(html: &str) -> Vec<FormStructure> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").unwrap();
    let label_selector = Selector::parse("label[for]").unwrap();

    let mut labels_by_id: HashMap<&str, String> = HashMap::new();
    for label in document.select(&label_selector) {
        if let Some(id) = label.value().attr("for") {
            if let Some(text) = non_empty(text_of(label)) {
                labels_by_id.entry(id).or_insert(text);
            }
        }
    }

    document
        .select(&form_selector)
        .map(|form| extract_form(form, &labels_by_id))
        .collect()
}

fn extract_form(form: ElementRef<'_>, labels_by_id: &HashMap<&str, String>) -> FormStructure {
    let control_selector = Selector::parse("input, textarea, select").unwrap();

    let controls: Vec<Control<'_>> = form
        .select(&control_selector)
        .filter_map(|element| {
            let el = element.value();
            let type_attr = el.attr("type");
            if el.name() == "input"
                && SKIPPED_TYPES.contains(&type_attr.unwrap_or("text").trim().to_ascii_lowercase().as_str())
            {
                return None;
            }
            let name = el
                .attr("name")
                .filter(|n| !n.is_empty())
                .or_else(|| el.attr("id"))
                .unwrap_or("")
                .to_string();
            Some(Control {
                element,
                kind: FieldKind::from_control(el.name(), type_attr),
                name,
            })
        })
        .collect();

    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for control in controls.iter().filter(|c| c.kind.is_groupable() && !c.name.is_empty()) {
        *group_sizes.entry(control.name.as_str()).or_default() += 1;
    }

    let mut fields: Vec<FormField> = Vec::new();
    let mut group_slots: HashMap<&str, usize> = HashMap::new();

    for control in &controls {
        let grouped = control.kind.is_groupable()
            && group_sizes.get(control.name.as_str()).copied().unwrap_or(0) > 1;

        if grouped {
            let option = control_label(control.element, labels_by_id)
                .or_else(|| control.element.value().attr("value").map(str::to_string))
                .unwrap_or_default();
            let required = is_required(control.element);

            if let Some(&slot) = group_slots.get(control.name.as_str()) {
                let field = &mut fields[slot];
                field.required |= required;
                field.options.get_or_insert_with(Vec::new).push(option);
            } else {
                let mut field = FormField::new(control.name.clone(), control.kind.clone()).required(required);
                field.label = group_label(control.element);
                field.options = Some(vec![option]);
                group_slots.insert(control.name.as_str(), fields.len());
                fields.push(field);
            }
            continue;
        }

        let el = control.element.value();
        let mut field =
            FormField::new(control.name.clone(), control.kind.clone()).required(is_required(control.element));
        field.label = control_label(control.element, labels_by_id);
        field.placeholder = el.attr("placeholder").filter(|p| !p.is_empty()).map(str::to_string);
        if control.kind == FieldKind::Select {
            field.options = Some(select_options(control.element));
        }
        fields.push(field);
    }

    let form_el = form.value();
    FormStructure {
        action: form_el.attr("action").filter(|a| !a.is_empty()).map(str::to_string),
        method: form_el.attr("method").filter(|m| !m.is_empty()).map(str::to_string),
        fields,
        submit_button: submit_text(form),
    }
}

fn is_required(element: ElementRef<'_>) -> bool {
    let el = element.value();
    el.attr("required").is_some() || el.attr("aria-required") == Some("true")
}

/// `<label for=id>` anywhere in the document, else a wrapping `<label>`.
fn control_label(element: ElementRef<'_>, labels_by_id: &HashMap<&str, String>) -> Option<String> {
    if let Some(text) = element
        .value()
        .attr("id")
        .and_then(|id| labels_by_id.get(id))
    {
        return Some(text.clone());
    }
    enclosing(element, "label").and_then(|label| non_empty(text_of(label)))
}

/// Caption for a radio/checkbox group, looked up from its first member.
fn group_label(first_member: ElementRef<'_>) -> Option<String> {
    if let Some(fieldset) = enclosing(first_member, "fieldset") {
        let legend = fieldset
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "legend");
        if let Some(text) = legend.and_then(|l| caption(text_of(l))) {
            return Some(text);
        }
    }

    // The member's own wrapping label holds the option text, so start above it.
    let anchor = enclosing(first_member, "label").unwrap_or(first_member);

    let sibling = anchor
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| GROUP_CAPTION_TAGS.contains(&el.value().name()));
    if let Some(text) = sibling.and_then(|el| caption(text_of(el))) {
        return Some(text);
    }

    anchor
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.prev_siblings().find_map(ElementRef::wrap))
        .and_then(|el| caption(text_of(el)))
}

fn select_options(select: ElementRef<'_>) -> Vec<String> {
    let option_selector = Selector::parse("option").unwrap();
    select
        .select(&option_selector)
        .map(|option| {
            option
                .value()
                .attr("value")
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| collapse_whitespace(&option.text().collect::<String>()))
        })
        .collect()
}

fn submit_text(form: ElementRef<'_>) -> Option<String> {
    let submit_selector = Selector::parse(r#"button[type="submit"], input[type="submit"]"#).unwrap();
    let submit = form.select(&submit_selector).next()?;
    let text = if submit.value().name() == "input" {
        submit.value().attr("value").map(collapse_whitespace).unwrap_or_default()
    } else {
        text_of(submit)
    };
    non_empty(text)
}

fn enclosing<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Collapsed text of `element`, leaving out text that belongs to nested controls.
fn text_of(element: ElementRef<'_>) -> String {
    fn walk(element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
                out.push(' ');
            } else if let Some(child_el) = ElementRef::wrap(child) {
                if !NON_LABEL_TAGS.contains(&child_el.value().name()) {
                    walk(child_el, out);
                }
            }
        }
    }

    let mut raw = String::new();
    walk(element, &mut raw);
    collapse_whitespace(&raw)
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn caption(text: String) -> Option<String> {
    let len = text.chars().count();
    (1..=MAX_CAPTION_CHARS).contains(&len).then_some(text)
}

/// How much a form looks like a contact form.
pub fn form_score(form: &FormStructure) -> i32 {
    let name_has = |f: &FormField, needle: &str| f.name.to_lowercase().contains(needle);
    let mut score = 0;

    if form.fields.iter().any(|f| f.kind == FieldKind::Email || name_has(f, "email")) {
        score += 10;
    }
    if form.fields.iter().any(|f| f.kind == FieldKind::Textarea) {
        score += 10;
    }
    if form.fields.iter().any(|f| name_has(f, "name")) {
        score += 5;
    }
    if form.fields.iter().any(|f| f.kind == FieldKind::Tel || name_has(f, "phone")) {
        score += 3;
    }
    if (3..=10).contains(&form.fields.len()) {
        score += 5;
    }
    score
}

/// Highest scoring form; the earliest one wins a tie.
pub fn select_contact_form(forms: Vec<FormStructure>) -> Option<FormStructure> {
    let mut best: Option<(i32, FormStructure)> = None;
    for form in forms {
        let score = form_score(&form);
        debug!("Form {:?} scored {}", form.action, score);
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, form));
        }
    }
    best.map(|(_, form)| form)
}

/// All forms on the current page. Driver failures yield an empty list.
pub async fn extract_forms(page: &dyn PageHandle) -> Vec<FormStructure> {
    match page.content().await {
        Ok(html) => extract_forms_from_html(&html),
        Err(e) => {
            warn!("Error extracting forms: {}", e);
            Vec::new()
        }
    }
}

/// The most likely contact form on the current page, or `None` when the page has no form.
pub async fn extract_contact_form(page: &dyn PageHandle) -> Option<FormStructure> {
    select_contact_form(extract_forms(page).await)
}
