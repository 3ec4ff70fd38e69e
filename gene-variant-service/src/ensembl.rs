use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, WalkthroughError};
use crate::models::Locus;

pub const DEFAULT_ENSEMBL_URL: &str = "https://rest.ensembl.org";
const SPECIES: &str = "homo_sapiens";

/// Chromosome placement returned by the identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub chromosome_id: String,
    pub start: Option<u64>,
}

/// Gene and assembly lookups needed to place a gene on a chromosome.
///
/// Every failure (transport, status, empty or malformed payload) is reported
/// as [`WalkthroughError::ResolutionNotFound`].
#[async_trait]
pub trait GenomeService: Send + Sync {
    /// Stable identifier for a gene symbol
    async fn lookup_symbol(&self, gene: &str) -> Result<String>;

    async fn lookup_id(&self, stable_id: &str) -> Result<GeneRecord>;

    /// Total length of a chromosome in bases
    async fn chromosome_length(&self, chromosome_id: &str) -> Result<u64>;
}

/// Resolve a gene symbol to its locus: symbol → stable id → chromosome and
/// start → chromosome length → arm. Calls are made one at a time and the
/// first failure aborts the resolution.
pub async fn resolve_locus(service: &dyn GenomeService, gene: &str) -> Result<Locus> {
    let gene = gene.trim();
    if gene.is_empty() {
        return Err(WalkthroughError::not_found("empty gene symbol"));
    }

    let stable_id = service.lookup_symbol(gene).await?;
    debug!(gene = %gene, stable_id = %stable_id, "Resolved gene symbol");

    let record = service.lookup_id(&stable_id).await?;
    let length = service.chromosome_length(&record.chromosome_id).await?;

    let locus = Locus::new(gene, stable_id, record.chromosome_id, length, record.start);
    info!(
        gene = %locus.gene,
        chromosome = %locus.chromosome_id,
        arm = %locus.arm,
        coordinate = ?locus.coordinate,
        "Gene located"
    );
    Ok(locus)
}

/// First `id` of an xrefs/symbol response
pub fn parse_symbol_response(gene: &str, body: &Value) -> Result<String> {
    body.as_array()
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WalkthroughError::not_found(format!("no Ensembl identifier for {}", gene)))
}

/// `seq_region_name` and `start` of a lookup/id response
pub fn parse_lookup_response(stable_id: &str, body: &Value) -> Result<GeneRecord> {
    let chromosome_id = body
        .get("seq_region_name")
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            WalkthroughError::not_found(format!("no chromosome reported for {}", stable_id))
        })?;

    Ok(GeneRecord {
        chromosome_id,
        start: body.get("start").and_then(Value::as_u64),
    })
}

/// `length` of an info/assembly response
pub fn parse_assembly_response(chromosome_id: &str, body: &Value) -> Result<u64> {
    body.get("length")
        .and_then(Value::as_u64)
        .filter(|length| *length > 0)
        .ok_or_else(|| {
            WalkthroughError::not_found(format!("no length reported for chromosome {}", chromosome_id))
        })
}

/// Ensembl REST client
pub struct EnsemblClient {
    client: Client,
    base_url: Url,
}

impl EnsemblClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("gene-variant-service/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder().default_headers(headers).build()?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Ensembl base URL {} cannot carry a path", base_url);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint URL with every segment percent-encoded on its own, so user
    /// text never leaves its path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.set_query(Some("content-type=application/json"));
        url
    }

    /// GET a JSON document; any transport, status or decoding problem is a
    /// resolution failure.
    async fn get_json(&self, segments: &[&str]) -> Result<Value> {
        let url = self.url(segments);
        let endpoint = url.path().to_string();
        debug!(url = %url, "Ensembl request");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Ensembl request failed");
            WalkthroughError::not_found(format!("request to {} failed: {}", endpoint, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Ensembl returned an error status");
            return Err(WalkthroughError::not_found(format!(
                "{} returned status {}",
                endpoint, status
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            warn!(url = %url, error = %e, "Ensembl returned malformed JSON");
            WalkthroughError::not_found(format!("malformed response from {}: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl GenomeService for EnsemblClient {
    async fn lookup_symbol(&self, gene: &str) -> Result<String> {
        let body = self
            .get_json(&["xrefs", "symbol", SPECIES, gene])
            .await?;
        parse_symbol_response(gene, &body)
    }

    async fn lookup_id(&self, stable_id: &str) -> Result<GeneRecord> {
        let body = self.get_json(&["lookup", "id", stable_id]).await?;
        parse_lookup_response(stable_id, &body)
    }

    async fn chromosome_length(&self, chromosome_id: &str) -> Result<u64> {
        let body = self
            .get_json(&["info", "assembly", SPECIES, chromosome_id])
            .await?;
        parse_assembly_response(chromosome_id, &body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned genome lookups keyed by symbol
    #[derive(Default)]
    pub(crate) struct FakeGenome {
        pub symbols: HashMap<String, String>,
        pub records: HashMap<String, GeneRecord>,
        pub lengths: HashMap<String, u64>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeGenome {
        pub(crate) fn with_gene(
            mut self,
            gene: &str,
            stable_id: &str,
            chromosome: &str,
            start: Option<u64>,
            length: u64,
        ) -> Self {
            self.symbols.insert(gene.to_string(), stable_id.to_string());
            self.records.insert(
                stable_id.to_string(),
                GeneRecord {
                    chromosome_id: chromosome.to_string(),
                    start,
                },
            );
            self.lengths.insert(chromosome.to_string(), length);
            self
        }
    }

    #[async_trait]
    impl GenomeService for FakeGenome {
        async fn lookup_symbol(&self, gene: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("symbol:{}", gene));
            let body = match self.symbols.get(gene) {
                Some(id) => json!([{ "id": id, "type": "gene" }]),
                None => json!([]),
            };
            parse_symbol_response(gene, &body)
        }

        async fn lookup_id(&self, stable_id: &str) -> Result<GeneRecord> {
            self.calls.lock().unwrap().push(format!("lookup:{}", stable_id));
            self.records
                .get(stable_id)
                .cloned()
                .ok_or_else(|| WalkthroughError::not_found(stable_id.to_string()))
        }

        async fn chromosome_length(&self, chromosome_id: &str) -> Result<u64> {
            self.calls.lock().unwrap().push(format!("assembly:{}", chromosome_id));
            self.lengths
                .get(chromosome_id)
                .copied()
                .ok_or_else(|| WalkthroughError::not_found(chromosome_id.to_string()))
        }
    }

    #[tokio::test]
    async fn resolves_gene_through_three_lookups() {
        let genome =
            FakeGenome::default().with_gene("NFIX", "ENSG00000008441", "19", Some(12_995_000), 58_617_616);

        let locus = resolve_locus(&genome, " NFIX ").await.unwrap();

        assert_eq!(locus.chromosome_id, "19");
        assert_eq!(locus.stable_id, "ENSG00000008441");
        assert_eq!(locus.arm, crate::models::Arm::P);
        assert_eq!(
            *genome.calls.lock().unwrap(),
            vec!["symbol:NFIX", "lookup:ENSG00000008441", "assembly:19"]
        );
    }

    #[tokio::test]
    async fn empty_symbol_result_stops_before_other_calls() {
        let genome = FakeGenome::default();

        let err = resolve_locus(&genome, "NOTAGENE").await.unwrap_err();

        assert!(matches!(err, WalkthroughError::ResolutionNotFound(_)));
        assert_eq!(*genome.calls.lock().unwrap(), vec!["symbol:NOTAGENE"]);
    }

    #[tokio::test]
    async fn blank_symbol_makes_no_calls() {
        let genome = FakeGenome::default();
        let err = resolve_locus(&genome, "   ").await.unwrap_err();
        assert!(matches!(err, WalkthroughError::ResolutionNotFound(_)));
        assert!(genome.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn symbol_payload_variants() {
        let ok = parse_symbol_response("TP53", &json!([{ "id": "ENSG00000141510" }, { "id": "LRG_321" }]));
        assert_eq!(ok.unwrap(), "ENSG00000141510");

        for bad in [json!([]), json!({ "error": "nope" }), json!([{ "type": "gene" }]), json!([{ "id": 7 }])] {
            assert!(matches!(
                parse_symbol_response("TP53", &bad),
                Err(WalkthroughError::ResolutionNotFound(_))
            ));
        }
    }

    #[test]
    fn lookup_payload_without_start_is_accepted() {
        let record = parse_lookup_response("ENSG1", &json!({ "seq_region_name": "X" })).unwrap();
        assert_eq!(record, GeneRecord { chromosome_id: "X".to_string(), start: None });

        let record =
            parse_lookup_response("ENSG1", &json!({ "seq_region_name": "7", "start": 140_719_327 }))
                .unwrap();
        assert_eq!(record.start, Some(140_719_327));
    }

    #[test]
    fn lookup_payload_without_chromosome_is_not_found() {
        let err = parse_lookup_response("ENSG1", &json!({ "start": 10 })).unwrap_err();
        assert!(matches!(err, WalkthroughError::ResolutionNotFound(_)));
    }

    #[test]
    fn assembly_payload_requires_length() {
        assert_eq!(parse_assembly_response("1", &json!({ "length": 248_956_422 })).unwrap(), 248_956_422);
        assert!(parse_assembly_response("1", &json!({ "length": "long" })).is_err());
        assert!(parse_assembly_response("1", &json!({})).is_err());
    }

    #[test]
    fn client_builds_json_urls() {
        let client = EnsemblClient::new("https://rest.ensembl.org/").unwrap();
        assert_eq!(client.base_url(), "https://rest.ensembl.org");
        assert_eq!(
            client.url(&["lookup", "id", "ENSG1"]).as_str(),
            "https://rest.ensembl.org/lookup/id/ENSG1?content-type=application/json"
        );
    }

    #[test]
    fn symbol_stays_one_path_segment() {
        let client = EnsemblClient::new(DEFAULT_ENSEMBL_URL).unwrap();
        let url = client.url(&["xrefs", "symbol", SPECIES, "NFIX?species=mouse#x/y"]);

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(
            segments,
            vec!["xrefs", "symbol", "homo_sapiens", "NFIX%3Fspecies=mouse%23x%2Fy"]
        );
        assert_eq!(url.query(), Some("content-type=application/json"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn base_url_path_is_kept() {
        let client = EnsemblClient::new("http://localhost:8080/ensembl/").unwrap();
        assert_eq!(
            client.url(&["lookup", "id", "ENSG1"]).path(),
            "/ensembl/lookup/id/ENSG1"
        );
    }
}
