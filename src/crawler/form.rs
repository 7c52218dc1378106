//! Form discovery for the POST tier
//!
//! Reservation pages often render availability only after the date form is
//! submitted. [`FormReplay::discover`] copies the first form's default field
//! values, finds the date field by name and produces a payload for any date.

use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use url::Url;

use crate::parser::selectors::FormSelectors;
use crate::utils::error::ParseError;

/// Field names tried when no date field can be recognized
pub const FALLBACK_DATE_FIELDS: &[&str] = &[
    "resdate", "sDate", "useDate", "use_date", "ymd", "riYmd", "selYmd",
];

/// A form ready to be re-submitted with a different date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormReplay {
    /// Absolute submission URL
    pub action: Url,
    /// Default field values in document order
    pub fields: Vec<(String, String)>,
    /// Field that carries the date, when one was recognized
    pub date_field: Option<String>,
}

impl FormReplay {
    /// Find the first form on the page and capture its defaults
    ///
    /// # Errors
    ///
    /// `ParseError::FormNotFound` when the page has no form,
    /// `ParseError::InvalidAction` when its action cannot be resolved
    pub fn discover(html: &str, page_url: &Url) -> Result<Self, ParseError> {
        let document = Html::parse_document(html);
        let selectors = FormSelectors::new();

        let form = document
            .select(selectors.form)
            .next()
            .ok_or(ParseError::FormNotFound)?;

        let action_attr = form.value().attr("action").unwrap_or("").trim();
        let action = if action_attr.is_empty() {
            page_url.clone()
        } else {
            page_url
                .join(action_attr)
                .map_err(|_| ParseError::InvalidAction(action_attr.to_string()))?
        };

        let mut fields = Vec::new();
        for field in form.select(selectors.fields) {
            let Some(name) = field.value().attr("name") else {
                continue;
            };
            if let Some(value) = field_value(field, &selectors) {
                fields.push((name.to_string(), value));
            }
        }

        let date_field = find_date_field(form, &selectors, &fields);

        Ok(Self {
            action,
            fields,
            date_field,
        })
    }

    /// Field list with the date overridden
    ///
    /// Without a recognized date field every fallback name is set.
    pub fn payload(&self, date: NaiveDate) -> Vec<(String, String)> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut payload = self.fields.clone();

        let targets: Vec<&str> = match &self.date_field {
            Some(name) => vec![name.as_str()],
            None => FALLBACK_DATE_FIELDS.to_vec(),
        };

        for target in targets {
            let mut replaced = false;
            for (name, value) in payload.iter_mut() {
                if name == target {
                    *value = date.clone();
                    replaced = true;
                }
            }
            if !replaced {
                payload.push((target.to_string(), date.clone()));
            }
        }

        payload
    }
}

/// Value a browser would submit for this field, `None` if it submits nothing
fn field_value(field: ElementRef<'_>, selectors: &FormSelectors) -> Option<String> {
    let element = field.value();
    match element.name() {
        "input" => {
            let kind = element.attr("type").unwrap_or("text").to_lowercase();
            if matches!(kind.as_str(), "checkbox" | "radio") && element.attr("checked").is_none() {
                return None;
            }
            if matches!(kind.as_str(), "submit" | "button" | "image" | "file" | "reset") {
                return None;
            }
            Some(element.attr("value").unwrap_or("").to_string())
        }
        "select" => {
            let option = field
                .select(selectors.option_selected)
                .next()
                .or_else(|| field.select(selectors.option).next());
            Some(
                option
                    .map(|o| {
                        o.value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                    })
                    .unwrap_or_default(),
            )
        }
        "textarea" => Some(field.text().collect::<String>()),
        _ => None,
    }
}

/// Date field by name heuristics: a typed date input, then names
/// containing `date`, then names containing `ymd`
fn find_date_field(
    form: ElementRef<'_>,
    selectors: &FormSelectors,
    fields: &[(String, String)],
) -> Option<String> {
    if let Some(name) = form
        .select(selectors.date_input)
        .filter_map(|input| input.value().attr("name"))
        .next()
    {
        return Some(name.to_string());
    }

    for needle in ["date", "ymd"] {
        if let Some((name, _)) = fields
            .iter()
            .find(|(name, _)| name.to_lowercase().contains(needle))
        {
            return Some(name.clone());
        }
    }

    None
}
