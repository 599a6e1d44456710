/// Person detail page extraction.
///
/// Every scalar field falls back to its placeholder when the page does not
/// carry it, so a resolved profile is always complete.
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{joined_text, non_blank};
use crate::model::{
    AGE_PLACEHOLDER, AssociatedPerson, EMAIL_PLACEHOLDER, LOCATION_PLACEHOLDER, NAME_PLACEHOLDER,
    PHONE_PLACEHOLDER, PersonProfile,
};

static FULL_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.person-name").expect("valid selector"));
static ADDON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.person-addon").expect("valid selector"));
static PHONE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop=telephone]").expect("valid selector"));
static EMAIL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop=email]").expect("valid selector"));
static RELATED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop=relatedTo]").expect("valid selector"));
static ITEM_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop=name]").expect("valid selector"));
static DIVS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").expect("valid selector"));

/// `age 72` or `Age 72, lives in …` inside the addon line.
static AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bage\s+([^,]+)").expect("valid regex"));

/// Reads a person detail page into a [`PersonProfile`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileExtractor;

impl ProfileExtractor {
    pub fn extract(&self, html: &str) -> PersonProfile {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let addon = first_text(root, &ADDON, " ");
        let age = addon
            .as_deref()
            .and_then(|text| AGE_RE.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .and_then(non_blank);
        let location = addon
            .as_deref()
            .and_then(|text| text.rsplit(',').next())
            .map(|segment| segment.trim().to_string())
            .filter(|segment| !AGE_RE.is_match(segment))
            .and_then(non_blank);

        PersonProfile {
            full_name: first_text(root, &FULL_NAME, " ")
                .unwrap_or_else(|| NAME_PLACEHOLDER.to_string()),
            age: age.unwrap_or_else(|| AGE_PLACEHOLDER.to_string()),
            location: location.unwrap_or_else(|| LOCATION_PLACEHOLDER.to_string()),
            email: first_text(root, &EMAIL, "").unwrap_or_else(|| EMAIL_PLACEHOLDER.to_string()),
            phone_number: first_text(root, &PHONE, "")
                .unwrap_or_else(|| PHONE_PLACEHOLDER.to_string()),
            associated_persons: root.select(&RELATED).filter_map(associated_person).collect(),
        }
    }
}

fn first_text(scope: ElementRef<'_>, selector: &Selector, sep: &str) -> Option<String> {
    scope
        .select(selector)
        .map(|el| joined_text(el, sep))
        .find(|text| !text.is_empty())
}

fn associated_person(card: ElementRef<'_>) -> Option<AssociatedPerson> {
    let name = first_text(card, &ITEM_NAME, " ");
    let age = card
        .select(&DIVS)
        .map(|div| joined_text(div, " "))
        .find(|text| text.contains("Age"))
        .map(|text| text.replace("Age", "").trim().to_string())
        .and_then(non_blank);
    let phone = first_text(card, &PHONE, "");

    if name.is_none() && age.is_none() && phone.is_none() {
        return None;
    }
    Some(AssociatedPerson { name, age, phone })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h1 class="person-name">John Smith</h1>
          <div class="person-addon">Age 72, Utica, NY</div>
          <span itemprop="telephone">(315) 555-0100</span>
          <a itemprop="email">john@example.test</a>
          <div itemprop="relatedTo">
            <span itemprop="name">Mary Smith</span>
            <div>Age 70</div>
            <span itemprop="telephone">(315) 555-0101</span>
          </div>
          <div itemprop="relatedTo">
            <span itemprop="name">Tom Smith</span>
          </div>
          <div itemprop="relatedTo"></div>
        </body></html>"#;

    #[test]
    fn test_full_profile() {
        let profile = ProfileExtractor.extract(PAGE);
        assert_eq!(profile.full_name, "John Smith");
        assert_eq!(profile.age, "72");
        assert_eq!(profile.location, "NY");
        assert_eq!(profile.phone_number, "(315) 555-0100");
        assert_eq!(profile.email, "john@example.test");

        assert_eq!(profile.associated_persons.len(), 2);
        let mary = &profile.associated_persons[0];
        assert_eq!(mary.name.as_deref(), Some("Mary Smith"));
        assert_eq!(mary.age.as_deref(), Some("70"));
        assert_eq!(mary.phone.as_deref(), Some("(315) 555-0101"));
        let tom = &profile.associated_persons[1];
        assert_eq!(tom.name.as_deref(), Some("Tom Smith"));
        assert!(tom.age.is_none());
    }

    #[test]
    fn test_empty_page_uses_placeholders() {
        let profile = ProfileExtractor.extract("<html><body></body></html>");
        assert_eq!(profile, PersonProfile::default());
    }

    #[test]
    fn test_addon_with_only_age() {
        let profile =
            ProfileExtractor.extract(r#"<div class="person-addon">Age 45</div>"#);
        assert_eq!(profile.age, "45");
        assert_eq!(profile.location, LOCATION_PLACEHOLDER);
    }
}
