//! Query templates used by the catalog tools.
//!
//! Placeholders are filled by `QueryBuilder`; caller input only ever lands in
//! a literal or URI fragment. Prefixed names rely on the injected prefix block.

pub const DESCRIBE_TYPES: &str = "\
SELECT DISTINCT ?type WHERE {
  {{uri}} a ?type .
}
ORDER BY ?type
LIMIT {{limit}}";

pub const DESCRIBE_PROPERTIES: &str = "\
SELECT ?property ?value WHERE {
  {{uri}} ?property ?value .
}
ORDER BY ?property ?value
LIMIT {{limit}}";

pub const DESCRIBE_INCOMING: &str = "\
SELECT ?subject ?property WHERE {
  ?subject ?property {{uri}} .
}
ORDER BY ?property ?subject
LIMIT {{limit}}";

/// An empty `{{language}}` literal matches labels in any language
pub const SEARCH_LABELS: &str = "\
SELECT ?resource ?label WHERE {
  ?resource rdfs:label ?label .
  FILTER(CONTAINS(LCASE(STR(?label)), LCASE({{text}})))
  FILTER({{language}} = \"\" || LANGMATCHES(LANG(?label), {{language}}))
}
ORDER BY ?label ?resource
LIMIT {{limit}}
OFFSET {{offset}}";

pub const SEARCH_LABELS_COUNT: &str = "\
SELECT (COUNT(*) AS ?total) WHERE {
  ?resource rdfs:label ?label .
  FILTER(CONTAINS(LCASE(STR(?label)), LCASE({{text}})))
  FILTER({{language}} = \"\" || LANGMATCHES(LANG(?label), {{language}}))
}";

pub const CODED_ENTITIES: &str = "\
SELECT ?code ?label WHERE {
  ?entity a {{class}} ;
          skos:notation ?code ;
          skos:prefLabel ?label .
}
ORDER BY ?code ?label
LIMIT {{limit}}
OFFSET {{offset}}";

pub const CODED_ENTITIES_COUNT: &str = "\
SELECT (COUNT(*) AS ?total) WHERE {
  ?entity a {{class}} ;
          skos:notation ?code ;
          skos:prefLabel ?label .
}";

/// Restricted to the codes on the page selected by `{{limit}}`/`{{offset}}`
pub const CODED_ENTITY_PARENTS: &str = "\
SELECT DISTINCT ?code ?parent WHERE {
  {
    SELECT ?code ?label WHERE {
      ?entity a {{class}} ;
              skos:notation ?code ;
              skos:prefLabel ?label .
    }
    ORDER BY ?code ?label
    LIMIT {{limit}}
    OFFSET {{offset}}
  }
  ?entity a {{class}} ;
          skos:notation ?code ;
          skos:broader ?broader .
  ?broader skos:prefLabel ?parent .
}
ORDER BY ?code ?parent";

pub const CODED_ENTITY_ALT_LABELS: &str = "\
SELECT DISTINCT ?code ?altLabel WHERE {
  {
    SELECT ?code ?label WHERE {
      ?entity a {{class}} ;
              skos:notation ?code ;
              skos:prefLabel ?label .
    }
    ORDER BY ?code ?label
    LIMIT {{limit}}
    OFFSET {{offset}}
  }
  ?entity a {{class}} ;
          skos:notation ?code ;
          skos:altLabel ?altLabel .
}
ORDER BY ?code ?altLabel";
