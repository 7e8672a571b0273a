// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;

pub const DEFAULT_LANGUAGE: &str = "pt";

// Catálogos embutidos no binário: não dependem do diretório de execução
const CATALOGS: [(&str, &str); 2] = [
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

/// Catálogo de mensagens de erro por idioma.
/// As mensagens usam marcadores posicionais `{0}`, `{1}`, ...
#[derive(Clone, Debug)]
pub struct I18nStore {
    catalogs: Arc<HashMap<String, HashMap<String, String>>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("Catálogo de idioma '{}' inválido", lang))?;
            catalogs.insert(lang.to_string(), messages);
        }

        Ok(Self { catalogs: Arc::new(catalogs) })
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.catalogs.contains_key(lang)
    }

    /// Traduz um código de mensagem. Idioma desconhecido cai no padrão;
    /// código desconhecido é devolvido como está.
    pub fn translate(&self, lang: &str, code: &str, args: &[String]) -> String {
        let template = self
            .catalogs
            .get(lang)
            .and_then(|catalog| catalog.get(code))
            .or_else(|| {
                self.catalogs
                    .get(DEFAULT_LANGUAGE)
                    .and_then(|catalog| catalog.get(code))
            });

        match template {
            Some(template) => args
                .iter()
                .enumerate()
                .fold(template.clone(), |msg, (i, arg)| msg.replace(&format!("{{{}}}", i), arg)),
            None => code.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_share_the_same_codes() {
        let store = I18nStore::load().unwrap();
        let pt = &store.catalogs["pt"];
        let en = &store.catalogs["en"];

        let mut pt_keys: Vec<_> = pt.keys().collect();
        let mut en_keys: Vec<_> = en.keys().collect();
        pt_keys.sort();
        en_keys.sort();
        assert_eq!(pt_keys, en_keys);
    }

    #[test]
    fn translate_fills_positional_args() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate("en", "phase_in_use", &["quoting".into(), "3".into()]);
        assert_eq!(msg, "Phase 'quoting' is used by 3 quote(s) and cannot be deleted.");
    }

    #[test]
    fn unknown_language_falls_back_to_portuguese() {
        let store = I18nStore::load().unwrap();
        assert!(!store.supports("fr"));
        assert_eq!(
            store.translate("fr", "loss_reason_required", &[]),
            "Informe o motivo da perda."
        );
    }

    #[test]
    fn unknown_code_is_returned_verbatim() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("pt", "nao_existe", &[]), "nao_existe");
    }
}
