//! Route graph shared by both passes.
//!
//! [`RouteCallLookup`] accumulates [`Contribution`]s per [`RouteKey`] and never drops
//! or replaces one. Resolution is a pure view over the recorded contributions:
//! documentation-sourced fields come first and win whenever they carry a value,
//! inferred fields only fill what documentation left empty or unknown.

use crate::http::ResponseKey;
use crate::model::{
    Contribution, HttpMethod, ParameterField, RequestBodyField, ResponseField, RouteField,
    RouteKey, Source,
};
use crate::type_reference::TypeReference;
use std::collections::BTreeMap;

/// Append-only map from route declaration site to contributed fields.
#[derive(Debug, Clone, Default)]
pub struct RouteCallLookup {
    entries: BTreeMap<RouteKey, Vec<Contribution>>,
}

/// Declared method, path and handler of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub handler: Option<String>,
}

/// Merged view of every contribution recorded for one or more keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedRoute {
    pub endpoint: Option<Endpoint>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<ParameterField>,
    pub responses: BTreeMap<ResponseKey, ResponseField>,
    pub request_body: Option<RequestBodyField>,
}

impl RouteCallLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends fields to the key's entry, creating it if absent.
    pub fn record(
        &mut self,
        key: RouteKey,
        source: Source,
        fields: impl IntoIterator<Item = RouteField>,
    ) {
        let entry = self.entries.entry(key).or_default();
        entry.extend(fields.into_iter().map(|field| Contribution { source, field }));
    }

    pub fn contains(&self, key: &RouteKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.entries.keys()
    }

    pub fn contributions(&self, key: &RouteKey) -> &[Contribution] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merged view of one key, `None` if nothing was recorded for it.
    pub fn resolve(&self, key: &RouteKey) -> Option<ResolvedRoute> {
        self.entries
            .get(key)
            .map(|_| self.resolve_merged(std::slice::from_ref(key)))
    }

    /// Merged view of several keys sharing one operation, in key order.
    pub fn resolve_merged(&self, keys: &[RouteKey]) -> ResolvedRoute {
        let mut contributions: Vec<&Contribution> = keys
            .iter()
            .flat_map(|key| self.contributions(key))
            .collect();
        // Stable: within one source, recording order is kept
        contributions.sort_by_key(|c| c.source);

        let mut merger = Merger::default();
        for contribution in contributions {
            merger.add(contribution);
        }
        merger.finish()
    }
}

struct MergedResponse {
    field: ResponseField,
    schema_source: Option<Source>,
}

#[derive(Default)]
struct Merger {
    route: ResolvedRoute,
    responses: BTreeMap<ResponseKey, MergedResponse>,
}

impl Merger {
    fn add(&mut self, contribution: &Contribution) {
        let route = &mut self.route;
        match &contribution.field {
            RouteField::Endpoint {
                method,
                path,
                handler,
            } => {
                if route.endpoint.is_none() {
                    route.endpoint = Some(Endpoint {
                        method: *method,
                        path: path.clone(),
                        handler: handler.clone(),
                    });
                }
            }
            RouteField::Summary(summary) => {
                route.summary.get_or_insert_with(|| summary.clone());
            }
            RouteField::Description(description) => {
                route.description.get_or_insert_with(|| description.clone());
            }
            RouteField::Tags(tags) => {
                for tag in tags {
                    if !route.tags.contains(tag) {
                        route.tags.push(tag.clone());
                    }
                }
            }
            RouteField::Deprecated => route.deprecated = true,
            RouteField::Parameter(parameter) => merge_parameter(&mut route.parameters, parameter),
            RouteField::Response(response) => self.merge_response(response, contribution.source),
            RouteField::RequestBody(body) => match &mut route.request_body {
                Some(existing) => {
                    fill(&mut existing.type_ref, &body.type_ref);
                    fill(&mut existing.content_type, &body.content_type);
                    fill(&mut existing.description, &body.description);
                }
                None => route.request_body = Some(body.clone()),
            },
        }
    }

    fn merge_response(&mut self, response: &ResponseField, source: Source) {
        let key = ResponseKey::resolve(&response.status);
        match self.responses.get_mut(&key) {
            None => {
                self.responses.insert(
                    key,
                    MergedResponse {
                        field: response.clone(),
                        schema_source: response.type_ref.as_ref().map(|_| source),
                    },
                );
            }
            Some(existing) => {
                fill(&mut existing.field.description, &response.description);
                fill(&mut existing.field.content_type, &response.content_type);
                match (&existing.field.type_ref, &response.type_ref) {
                    (None, Some(type_ref)) => {
                        existing.field.type_ref = Some(type_ref.clone());
                        existing.schema_source = Some(source);
                    }
                    (Some(current), Some(type_ref))
                        if current != type_ref
                            && existing.schema_source == Some(Source::Inference)
                            && source == Source::Inference =>
                    {
                        existing.field.type_ref =
                            Some(TypeReference::union(vec![current.clone(), type_ref.clone()]));
                    }
                    _ => {}
                }
            }
        }
    }

    fn finish(mut self) -> ResolvedRoute {
        self.route.responses = self
            .responses
            .into_iter()
            .map(|(key, merged)| (key, merged.field))
            .collect();
        self.route
    }
}

fn merge_parameter(parameters: &mut Vec<ParameterField>, parameter: &ParameterField) {
    let existing = parameters.iter_mut().find(|p| {
        p.name == parameter.name
            && (p.location == parameter.location
                || p.location.is_unknown()
                || parameter.location.is_unknown())
    });
    match existing {
        Some(existing) => {
            if existing.location.is_unknown() {
                existing.location = parameter.location;
            }
            fill(&mut existing.type_ref, &parameter.type_ref);
            fill(&mut existing.description, &parameter.description);
            for (name, value) in &parameter.attributes {
                existing
                    .attributes
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        None => parameters.push(parameter.clone()),
    }
}

/// Fills `slot` from `value` when it is still empty.
fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}
