//! `FieldsApi`: TTL-cached schema catalog plus adapter and field resolution.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ApiError, Error, NotFoundError, Result};
use crate::fuzzy::{fuzzy_filter, FuzzyConfig};
use crate::schema::{
    parse_fields, pretty_schemas, FieldSchema, RawFields, SchemaCatalog, AGG_ADAPTER_ALTS,
    AGG_ADAPTER_NAME, ADAPTER_NAME_SUFFIX, ALL_NAME, RAW_NAME,
};

/// How long a fetched catalog stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Exact-match keys in priority order; the first key with a hit wins.
pub const GET_SCHEMA_KEYS: [&str; 4] = ["name_base", "name_qual", "name", "title"];

/// Detects an `adapters_data.<adapter>.` prefix on a field search.
static QUAL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^adapters_data\.(.*?)\.").expect("static pattern compiles")
});

/// One read call against the platform fields endpoint.
pub trait FieldsTransport {
    fn fetch_fields(&self) -> anyhow::Result<RawFields>;
}

struct CacheEntry {
    fetched: Instant,
    catalog: Arc<SchemaCatalog>,
}

/// Field schema access with a TTL cache over one transport.
pub struct FieldsApi<T> {
    transport: T,
    cache: Mutex<Option<CacheEntry>>,
    ttl: Duration,
    fuzzy: FuzzyConfig,
}

impl<T: FieldsTransport> FieldsApi<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: Mutex::new(None),
            ttl: CACHE_TTL,
            fuzzy: FuzzyConfig::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// The catalog, fetched through the transport when missing or stale.
    pub fn get(&self) -> Result<Arc<SchemaCatalog>> {
        let mut guard = self.lock_cache();
        if let Some(entry) = guard.as_ref() {
            if entry.fetched.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.catalog));
            }
        }
        let catalog = self.fetch()?;
        *guard = Some(CacheEntry {
            fetched: Instant::now(),
            catalog: Arc::clone(&catalog),
        });
        Ok(catalog)
    }

    /// Drop the cached catalog; the next `get` fetches.
    pub fn invalidate(&self) {
        *self.lock_cache() = None;
    }

    /// Fetch now regardless of freshness and replace the cache.
    pub fn refresh(&self) -> Result<Arc<SchemaCatalog>> {
        let catalog = self.fetch()?;
        *self.lock_cache() = Some(CacheEntry {
            fetched: Instant::now(),
            catalog: Arc::clone(&catalog),
        });
        Ok(catalog)
    }

    fn fetch(&self) -> Result<Arc<SchemaCatalog>> {
        let raw = self.transport.fetch_fields().map_err(Error::SchemaFetch)?;
        let catalog = Arc::new(parse_fields(&raw));
        debug!("fetched field schemas for {} adapters", catalog.len());
        Ok(catalog)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        self.cache.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Resolve an adapter reference to its short catalog name.
    pub fn resolve_adapter(&self, value: &str) -> Result<String> {
        let search = normalize_adapter(value);
        let catalog = self.get()?;
        if catalog.contains_key(&search) {
            return Ok(search);
        }
        Err(NotFoundError {
            value: value.to_string(),
            kind: "adapter",
            candidates: catalog.keys().cloned().collect(),
            fuzzy: false,
        }
        .into())
    }

    /// All adapter names whose short name matches `value` as a
    /// case-insensitive regex.
    pub fn resolve_adapter_names(&self, value: &str) -> Result<Vec<String>> {
        let search = normalize_adapter(value);
        let pattern = Regex::new(&format!("(?i){search}"))
            .map_err(|err| ApiError::new(format!("invalid adapter pattern {value:?}: {err}")))?;
        let catalog = self.get()?;
        let matches: Vec<String> = catalog
            .keys()
            .filter(|name| pattern.is_match(name))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(NotFoundError {
                value: value.to_string(),
                kind: "adapter",
                candidates: catalog.keys().cloned().collect(),
                fuzzy: false,
            }
            .into());
        }
        Ok(matches)
    }

    /// Resolve a single `[adapter:]field` reference to its schema.
    pub fn resolve_field(&self, value: &str) -> Result<FieldSchema> {
        let (adapter, fields) = split_search(value, AGG_ADAPTER_NAME)?;
        if fields.len() != 1 {
            return Err(ApiError::new(format!(
                "expected exactly one field in {value:?}, got {}",
                fields.len()
            ))
            .into());
        }
        let adapter = self.resolve_adapter(&adapter)?;
        let catalog = self.get()?;
        let schemas = &catalog[&adapter];
        self.field_schema(&fields[0], schemas).cloned()
    }

    /// Resolve a comma separated `[adapter:]field,field,...` reference list.
    /// Order preserving, deduplicated by qualified name.
    pub fn resolve_fields(&self, value: &str) -> Result<Vec<FieldSchema>> {
        let (adapter, fields) = split_search(value, AGG_ADAPTER_NAME)?;
        let adapter = self.resolve_adapter(&adapter)?;
        let catalog = self.get()?;
        let schemas = &catalog[&adapter];
        let mut resolved: Vec<FieldSchema> = Vec::new();
        for field in &fields {
            let schema = self.field_schema(field, schemas)?;
            if !resolved.iter().any(|s| s.name_qual == schema.name_qual) {
                resolved.push(schema.clone());
            }
        }
        Ok(resolved)
    }

    /// Qualified names of fields matching `[adapter-re:]field-re`.
    /// Root selectable fields only; `all` and `raw_data` are excluded.
    pub fn resolve_field_names_re(&self, value: &str) -> Result<Vec<String>> {
        let (adapter_search, field_searches) = split_search(value, ".")?;
        let adapters = self.resolve_adapter_names(&adapter_search)?;
        let catalog = self.get()?;
        let mut names: Vec<String> = Vec::new();
        for field_search in &field_searches {
            let pattern = Regex::new(&format!("(?i){field_search}")).map_err(|err| {
                ApiError::new(format!("invalid field pattern {field_search:?}: {err}"))
            })?;
            for adapter in &adapters {
                for schema in &catalog[adapter] {
                    let matched = schema.selectable
                        && schema.is_root
                        && schema.name_base != ALL_NAME
                        && schema.name_base != RAW_NAME
                        && GET_SCHEMA_KEYS
                            .iter()
                            .any(|key| pattern.is_match(schema.key_value(key)));
                    if matched && !names.contains(&schema.name_qual) {
                        names.push(schema.name_qual.clone());
                    }
                }
            }
        }
        Ok(names)
    }

    /// Qualified names of all root selectable fields of one adapter.
    pub fn root_field_names(&self, adapter: &str) -> Result<Vec<String>> {
        let adapter = self.resolve_adapter(adapter)?;
        let catalog = self.get()?;
        Ok(catalog[&adapter]
            .iter()
            .filter(|s| s.selectable && s.is_root)
            .map(|s| s.name_qual.clone())
            .collect())
    }

    /// Find one field among an adapter's schemas by exact key match.
    ///
    /// On a miss the error lists fuzzy-narrowed candidates when any exist,
    /// otherwise every selectable field of the adapter.
    pub fn field_schema<'a>(
        &self,
        value: &str,
        schemas: &'a [FieldSchema],
    ) -> Result<&'a FieldSchema> {
        let search = value.trim().to_lowercase();
        if search.is_empty() {
            return Err(ApiError::new("empty field search").into());
        }
        for key in GET_SCHEMA_KEYS {
            for schema in schemas.iter().filter(|s| s.selectable) {
                if schema.key_value(key).to_lowercase() == search {
                    debug!("resolved field {value:?} via key {key}");
                    return Ok(schema);
                }
            }
        }

        let fuzzy = fuzzy_filter(&search, schemas, &self.fuzzy);
        let (candidates, is_fuzzy) = if fuzzy.is_empty() {
            let selectable: Vec<&FieldSchema> =
                schemas.iter().filter(|s| s.selectable).collect();
            (pretty_schemas(selectable.into_iter()), false)
        } else {
            (pretty_schemas(fuzzy.into_iter()), true)
        };
        Err(NotFoundError {
            value: value.to_string(),
            kind: "field",
            candidates,
            fuzzy: is_fuzzy,
        }
        .into())
    }
}

/// Normalize an adapter reference: trim, lowercase, strip `_adapter`,
/// fold aggregation aliases onto the aggregated adapter.
pub fn normalize_adapter(value: &str) -> String {
    let search = value.trim().to_lowercase();
    let search = crate::schema::strip_right(&search, ADAPTER_NAME_SUFFIX);
    if AGG_ADAPTER_ALTS.contains(&search) {
        AGG_ADAPTER_NAME.to_string()
    } else {
        search.to_string()
    }
}

/// Split `[adapter:]field[,field...]` into the adapter part and the field
/// parts. A qualified `adapters_data.<adapter>.` field prefix overrides the
/// adapter, as does an explicit `adapter:` prefix; otherwise `default` is
/// used.
pub fn split_search(value: &str, default: &str) -> Result<(String, Vec<String>)> {
    let search = value.trim().to_lowercase();
    let (mut adapter, fields_part) = match search.split_once(':') {
        Some((adapter, fields)) => (adapter.trim().to_string(), fields.to_string()),
        None => (String::new(), search.clone()),
    };
    if adapter.is_empty() {
        adapter = default.trim().to_lowercase();
    }
    if let Some(caps) = QUAL_PREFIX_RE.captures(&fields_part) {
        adapter = caps[1].to_string();
    }
    adapter = crate::schema::strip_right(&adapter, ADAPTER_NAME_SUFFIX).to_string();

    let fields: Vec<String> = fields_part
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return Err(ApiError::new(format!("no fields provided in {value:?}")).into());
    }
    Ok((adapter, fields))
}

#[cfg(test)]
pub(crate) mod test_transport {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::FieldsTransport;
    use crate::schema::RawFields;

    /// Canned transport counting fetches.
    pub(crate) struct CannedTransport {
        pub(crate) calls: AtomicUsize,
        fail: bool,
    }

    impl CannedTransport {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FieldsTransport for CannedTransport {
        fn fetch_fields(&self) -> anyhow::Result<RawFields> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(crate::schema::test_fixtures::sample_raw())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_transport::CannedTransport;
    use super::*;
    use pretty_assertions::assert_eq;

    fn api() -> FieldsApi<CannedTransport> {
        FieldsApi::new(CannedTransport::new())
    }

    #[test]
    fn test_cache_serves_second_get() {
        let api = api();
        api.get().unwrap();
        api.get().unwrap();
        assert_eq!(api.transport.call_count(), 1);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let api = api();
        api.get().unwrap();
        api.invalidate();
        api.get().unwrap();
        assert_eq!(api.transport.call_count(), 2);
    }

    #[test]
    fn test_refresh_always_fetches() {
        let api = api();
        api.get().unwrap();
        api.refresh().unwrap();
        assert_eq!(api.transport.call_count(), 2);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let api = FieldsApi::new(CannedTransport::new()).with_ttl(Duration::ZERO);
        api.get().unwrap();
        api.get().unwrap();
        assert_eq!(api.transport.call_count(), 2);
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let api = FieldsApi::new(CannedTransport::failing());
        let err = api.get().unwrap_err();
        assert!(matches!(err, Error::SchemaFetch(_)));
    }

    #[test]
    fn test_normalize_adapter_aliases() {
        for alias in ["generic", "GENERAL", " aggregated ", "agg", "specific"] {
            assert_eq!(normalize_adapter(alias), "agg");
        }
        assert_eq!(normalize_adapter("aws_adapter"), "aws");
        assert_eq!(normalize_adapter("Aws"), "aws");
    }

    #[test]
    fn test_resolve_adapter_unknown_lists_all() {
        let api = api();
        let err = api.resolve_adapter("nope").unwrap_err();
        assert_eq!(
            err.candidates(),
            Some(&["agg".to_string(), "aws".to_string()][..])
        );
    }

    #[test]
    fn test_resolve_adapter_names_regex() {
        let api = api();
        assert_eq!(
            api.resolve_adapter_names("^aw").unwrap(),
            vec!["aws".to_string()]
        );
        assert_eq!(api.resolve_adapter_names(".").unwrap().len(), 2);
    }

    #[test]
    fn test_split_search_defaults_adapter() {
        let (adapter, fields) = split_search("hostname", AGG_ADAPTER_NAME).unwrap();
        assert_eq!(adapter, "agg");
        assert_eq!(fields, vec!["hostname".to_string()]);
    }

    #[test]
    fn test_split_search_explicit_adapter_and_list() {
        let (adapter, fields) = split_search("AWS:instance_id, aws_device_type", "agg").unwrap();
        assert_eq!(adapter, "aws");
        assert_eq!(
            fields,
            vec!["instance_id".to_string(), "aws_device_type".to_string()]
        );
    }

    #[test]
    fn test_split_search_detects_qualified_prefix() {
        let (adapter, fields) =
            split_search("adapters_data.aws_adapter.instance_id", "agg").unwrap();
        assert_eq!(adapter, "aws");
        assert_eq!(
            fields,
            vec!["adapters_data.aws_adapter.instance_id".to_string()]
        );
    }

    #[test]
    fn test_split_search_rejects_empty_fields() {
        assert!(split_search("aws:", "agg").is_err());
        assert!(split_search("  ", "agg").is_err());
    }

    #[test]
    fn test_resolve_field_by_base_name() {
        let api = api();
        let schema = api.resolve_field("hostname").unwrap();
        assert_eq!(schema.name_qual, "specific_data.data.hostname");
        assert_eq!(schema.adapter_name, "agg");
    }

    #[test]
    fn test_resolve_field_by_title() {
        let api = api();
        let schema = api.resolve_field("Host Name").unwrap();
        assert_eq!(schema.name_base, "hostname");
    }

    #[test]
    fn test_key_priority_prefers_name_base_over_title() {
        // "host_name" matches name_base of host_name before anything else,
        // even though "Host Name" is hostname's title.
        let api = api();
        let schema = api.resolve_field("host_name").unwrap();
        assert_eq!(schema.name_base, "host_name");
    }

    #[test]
    fn test_resolve_field_specific_adapter() {
        let api = api();
        let schema = api.resolve_field("aws:instance_id").unwrap();
        assert_eq!(schema.adapter_name, "aws");
        assert_eq!(schema.name_qual, "adapters_data.aws_adapter.instance_id");
    }

    #[test]
    fn test_resolve_field_typo_gets_fuzzy_candidates() {
        let api = api();
        let err = api.resolve_field("hstname").unwrap_err();
        let Error::NotFound(not_found) = err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert!(not_found.fuzzy);
        assert!(not_found
            .candidates
            .iter()
            .any(|c| c.contains("agg:hostname")));
        assert!(!not_found.candidates.iter().any(|c| c.contains("os.type")));
    }

    #[test]
    fn test_resolve_field_gibberish_lists_all_selectable() {
        let api = api();
        let err = api.resolve_field("zzqqxx").unwrap_err();
        let Error::NotFound(not_found) = err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert!(!not_found.fuzzy);
        assert!(not_found.candidates.len() > 5);
    }

    #[test]
    fn test_resolve_fields_dedupes_preserving_order() {
        let api = api();
        let schemas = api.resolve_fields("hostname,os.type,hostname").unwrap();
        let names: Vec<&str> = schemas.iter().map(|s| s.name_base.as_str()).collect();
        assert_eq!(names, vec!["hostname", "os.type"]);
    }

    #[test]
    fn test_resolve_field_rejects_multiple() {
        let api = api();
        assert!(api.resolve_field("hostname,os.type").is_err());
    }

    #[test]
    fn test_round_trip_every_selectable_qual() {
        // The aws "all" qual is the bare adapter prefix and only resolves
        // with an explicit adapter, so is_all fields are checked separately.
        let api = api();
        let catalog = api.get().unwrap();
        for schemas in catalog.values() {
            for schema in schemas.iter().filter(|s| s.selectable && !s.is_all) {
                let resolved = api.resolve_field(&schema.name_qual).unwrap_or_else(|err| {
                    panic!("round trip failed for {}: {err}", schema.name_qual)
                });
                assert_eq!(resolved.name_qual, schema.name_qual);
            }
        }
        assert!(api.resolve_field("aws:all").unwrap().is_all);
        assert_eq!(api.resolve_field("specific_data").unwrap().name_base, "all");
    }

    #[test]
    fn test_details_fields_never_resolve() {
        let api = api();
        assert!(api.resolve_field("hostname_details").is_err());
    }

    #[test]
    fn test_resolve_field_names_re() {
        let api = api();
        let names = api.resolve_field_names_re("host").unwrap();
        assert!(names.contains(&"specific_data.data.hostname".to_string()));
        assert!(!names.iter().any(|n| n.ends_with("_details")));
    }

    #[test]
    fn test_root_field_names_skips_all_and_non_root() {
        let api = api();
        let names = api.root_field_names("agg").unwrap();
        assert!(names.contains(&"specific_data.data.hostname".to_string()));
        assert!(!names.contains(&"specific_data".to_string()));
    }
}
