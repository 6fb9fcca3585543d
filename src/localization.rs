//! # Localization
//!
//! User-visible text lives in Fluent resources under `locales/`, bundled into
//! the binary. Messages are looked up in the user's Telegram language and fall
//! back to English.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use tracing::error;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

/// Localization manager for the bot
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a manager holding every bundled language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(language.to_string(), Arc::new(bundle));
        }
        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate messages in {locale} resource: {errors:?}"))?;

        Ok(bundle)
    }

    /// Whether a bundle exists for the language part of `language_code`
    pub fn is_supported(&self, language_code: &str) -> bool {
        self.bundles.contains_key(primary_language(language_code))
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language_code: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(primary_language(language_code))
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let message = match bundle.get_message(key) {
            Some(message) => message,
            None if language_code != DEFAULT_LANGUAGE => {
                return self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
            }
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match message.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = Vec::new();
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }

    /// Get an English message
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }
}

fn primary_language(language_code: &str) -> &str {
    language_code.split(['-', '_']).next().unwrap_or(language_code)
}

static LOCALIZATION: LazyLock<Option<LocalizationManager>> = LazyLock::new(|| {
    LocalizationManager::new()
        .map_err(|e| error!(error = %e, "Failed to load bundled translations"))
        .ok()
});

/// Localized message in the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    t_args_lang(key, &[], language_code)
}

/// Localized message with arguments in the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let Some(manager) = LOCALIZATION.as_ref() else {
        return format!("Missing translation: {key}");
    };
    let language = language_code.unwrap_or(DEFAULT_LANGUAGE);
    if args.is_empty() {
        manager.get_message_in_language(key, language, None)
    } else {
        let args: HashMap<&str, &str> = args.iter().copied().collect();
        manager.get_message_in_language(key, language, Some(&args))
    }
}

/// English message
pub fn t(key: &str) -> String {
    t_lang(key, None)
}

/// English message with arguments
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    t_args_lang(key, args, None)
}
