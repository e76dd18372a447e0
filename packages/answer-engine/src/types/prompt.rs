//! Prompts and the parameters shared across one submission.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where answers should be localized to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    /// ISO 3166-1 alpha-2 country code, e.g. "US" or "GB"
    pub country: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Locale {
    pub fn country(code: impl Into<String>) -> Self {
        Self {
            country: code.into(),
            region: None,
            city: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::country("US")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.city, &self.region].into_iter().flatten() {
            write!(f, "{part}, ")?;
        }
        f.write_str(&self.country)
    }
}

/// Parameters shared by every prompt in one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedParams {
    pub locale: Locale,
    pub web_search: bool,
}

impl SharedParams {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            web_search: true,
        }
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

/// One prompt in a submitted batch.
///
/// `index` is the 1-based position the client assigned at submission. It is
/// the correlation key for mapping results back and is never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    index: usize,
    text: String,
    locale: Locale,
    web_search: bool,
}

impl Prompt {
    pub(crate) fn new(index: usize, text: impl Into<String>, params: &SharedParams) -> Self {
        Self {
            index,
            text: text.into(),
            locale: params.locale.clone(),
            web_search: params.web_search,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }
}

/// An ordered set of prompts destined for one provider submission.
#[derive(Debug, Clone)]
pub struct PromptBatch {
    prompts: Vec<Prompt>,
    params: SharedParams,
}

impl PromptBatch {
    /// Build a batch, assigning indexes 1..=n in the order given.
    pub fn new<I, S>(texts: I, params: SharedParams) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts = texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Prompt::new(position + 1, text, &params))
            .collect();
        Self { prompts, params }
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
