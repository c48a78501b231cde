//! Transformer chains: declarative data mapping from the workflow context
//! into a plugin's request, response or iteration shape.
//!
//! Every transformer in a chain reads the *original* source value. Their
//! results are merged together (objects key by key, anything else replaces
//! what came before), so a chain is a set of independent projections rather
//! than a pipe.

pub mod helpers;
pub mod jmespath;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::deep_merge;
use crate::{BuildError, PluginError};

pub use self::helpers::{HelperMethod, HelperRule, HelpersTransformer};
pub use self::jmespath::JmespathTransformer;

/// Serializable transformer declaration: `{ "transformer": "jmespath", "mapping": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub transformer: String,
    pub mapping: Value,
}

impl TransformerSpec {
    pub fn jmespath(expression: impl Into<String>) -> Self {
        Self {
            transformer: "jmespath".into(),
            mapping: Value::String(expression.into()),
        }
    }

    pub fn helper(rules: Value) -> Self {
        Self {
            transformer: "helper".into(),
            mapping: rules,
        }
    }
}

/// A materialised transformer.
#[derive(Debug)]
pub enum Transformer {
    Jmespath(JmespathTransformer),
    Helpers(HelpersTransformer),
}

impl Transformer {
    /// Resolve a declaration into a transformer.
    ///
    /// # Errors
    /// [`BuildError::UnsupportedTransformer`] for unknown kinds, plus whatever
    /// the concrete transformer reports for a malformed mapping.
    pub fn try_from_spec(spec: &TransformerSpec) -> Result<Self, BuildError> {
        match spec.transformer.as_str() {
            "jmespath" => {
                let expression = spec.mapping.as_str().ok_or_else(|| BuildError::InvalidQuery {
                    expression: spec.mapping.to_string(),
                    reason: "mapping must be a string".into(),
                })?;
                Ok(Self::Jmespath(JmespathTransformer::new(expression)?))
            }
            "helper" => Ok(Self::Helpers(HelpersTransformer::try_from_mapping(&spec.mapping)?)),
            other => Err(BuildError::UnsupportedTransformer(other.to_owned())),
        }
    }

    pub fn transform(&self, source: &Value) -> Result<Value, PluginError> {
        match self {
            Self::Jmespath(t) => t.transform(source),
            Self::Helpers(t) => Ok(t.transform(source)),
        }
    }
}

/// Ordered list of transformers applied to the same source.
#[derive(Debug, Default)]
pub struct TransformerChain {
    transformers: Vec<Transformer>,
}

impl TransformerChain {
    pub fn try_from_specs(specs: &[TransformerSpec]) -> Result<Self, BuildError> {
        let transformers = specs
            .iter()
            .map(Transformer::try_from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { transformers })
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Apply the chain. An empty chain passes the source through unchanged.
    pub fn apply(&self, source: &Value) -> Result<Value, PluginError> {
        let mut combined: Option<Value> = None;

        for transformer in &self.transformers {
            let projection = transformer.transform(source)?;
            combined = Some(match combined {
                None => projection,
                Some(mut acc) => {
                    deep_merge(&mut acc, projection);
                    acc
                }
            });
        }

        Ok(combined.unwrap_or_else(|| source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsupported_transformer_fails_at_construction() {
        let spec = TransformerSpec {
            transformer: "xslt".into(),
            mapping: json!("whatever"),
        };
        assert!(matches!(
            TransformerChain::try_from_specs(&[spec]),
            Err(BuildError::UnsupportedTransformer(kind)) if kind == "xslt"
        ));
    }

    #[test]
    fn empty_chain_passes_source_through() {
        let chain = TransformerChain::default();
        let source = json!({ "amount": 10 });
        assert_eq!(chain.apply(&source).unwrap(), source);
    }

    #[test]
    fn each_transformer_reads_the_original_source() {
        let chain = TransformerChain::try_from_specs(&[
            TransformerSpec::jmespath("{ body: { value: amount } }"),
            // Would see `body` if the chain were a pipe; it must not.
            TransformerSpec::jmespath("{ body: { seen: body } }"),
        ])
        .unwrap();

        let out = chain.apply(&json!({ "amount": 10 })).unwrap();
        assert_eq!(out, json!({ "body": { "value": 10, "seen": null } }));
    }

    #[test]
    fn helper_and_query_results_are_merged() {
        let chain = TransformerChain::try_from_specs(&[
            TransformerSpec::jmespath("{ name: entity.name }"),
            TransformerSpec::helper(json!([
                { "source": "entity.name", "target": "upper", "method": "upperCase" }
            ])),
        ])
        .unwrap();

        let out = chain.apply(&json!({ "entity": { "name": "acme" } })).unwrap();
        assert_eq!(out["name"], "acme");
        assert_eq!(out["upper"], "ACME");
        assert_eq!(out["entity"]["name"], "acme");
    }
}
