use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::PropertyGraph;
use crate::model::{Attributes, NodeId, Value};
use crate::schema::SchemaRegistry;

/// The built-in scholarly registry.
pub fn scholarly() -> SchemaRegistry {
    SchemaRegistry::scholarly().expect("built-in schema is valid")
}

/// Bundles identified by the full set of their members.
pub fn bundles() -> SchemaRegistry {
    SchemaRegistry::from_json(
        r#"{
            "version": "test",
            "types": [
                {
                    "name": "bundle",
                    "fields": {
                        "label": {"kind": "attribute"},
                        "members": {"kind": "to_many", "target": "member", "reverse_of": "bundle"}
                    },
                    "disambiguation": {"all": ["members"]}
                },
                {
                    "name": "member",
                    "fields": {
                        "code": {"kind": "attribute"},
                        "bundle": {"kind": "to_one", "target": "bundle"}
                    },
                    "disambiguation": {"all": ["code"]}
                }
            ]
        }"#,
    )
    .expect("bundle schema is valid")
}

pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

/// Terse graph construction with generated blank-node ids.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: PropertyGraph,
    next_blank: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number blank nodes from `offset` so graphs built separately never
    /// share ids.
    pub fn with_offset(offset: usize) -> Self {
        Self {
            graph: PropertyGraph::new(),
            next_blank: offset,
        }
    }

    pub fn node(&mut self, type_name: &str, pairs: &[(&str, &str)]) -> NodeId {
        let external_id = format!("_:b{}", self.next_blank);
        self.next_blank += 1;
        self.graph.create(external_id, type_name, attrs(pairs))
    }

    pub fn relate(&mut self, subject: NodeId, object: NodeId, name: &str) -> &mut Self {
        self.graph
            .relate(subject, object, name)
            .expect("both nodes were created by this builder");
        self
    }

    /// A creative work with one identifier node per uri.
    pub fn work(&mut self, type_name: &str, pairs: &[(&str, &str)], uris: &[&str]) -> NodeId {
        let work = self.node(type_name, pairs);
        for uri in uris {
            let identifier = self.node("workidentifier", &[("uri", uri)]);
            self.relate(identifier, work, "creative_work");
        }
        work
    }

    /// An agent with one identifier node per uri.
    pub fn agent(&mut self, type_name: &str, pairs: &[(&str, &str)], uris: &[&str]) -> NodeId {
        let agent = self.node(type_name, pairs);
        for uri in uris {
            let identifier = self.node("agentidentifier", &[("uri", uri)]);
            self.relate(identifier, agent, "agent");
        }
        agent
    }

    pub fn graph(&self) -> &PropertyGraph {
        &self.graph
    }

    pub fn build(self) -> PropertyGraph {
        self.graph
    }
}

/// Graph A: a preprint related to a sparse work placeholder. Graph B: the
/// full article behind that placeholder.
pub fn preprint_article_scenario() -> (PropertyGraph, PropertyGraph) {
    let mut a = GraphBuilder::new();
    let preprint = a.work("preprint", &[("title", "Preprint Title")], &["http://osf.io/blahblah"]);
    let stub = a.work("creativework", &[], &["http://osf.io/guidguid"]);
    let relation = a.node("workrelation", &[]);
    a.relate(relation, preprint, "subject");
    a.relate(relation, stub, "related");

    let mut b = GraphBuilder::with_offset(100);
    b.work(
        "article",
        &[("title", "Article Title"), ("description", "Full article")],
        &["http://osf.io/guidguid"],
    );
    (a.build(), b.build())
}

/// Sorted `type {attrs}` renderings of every node, for multiset comparison.
pub fn node_signatures(graph: &PropertyGraph) -> Vec<String> {
    let mut signatures: Vec<String> = graph
        .nodes()
        .map(|node| {
            let attrs: Vec<String> = node
                .attrs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.render()))
                .collect();
            format!("{} {{{}}}", node.type_name, attrs.join(", "))
        })
        .collect();
    signatures.sort();
    signatures
}

const WORK_TYPES: [&str; 3] = ["creativework", "publication", "article"];
const TAG_NAMES: [&str; 4] = ["rust", "graphs", "metadata", "provenance"];

/// Random scholarly graph with deliberate duplicates.
///
/// Duplicates are drawn so that pruning never meets an ambiguous match:
/// every work and person carries exactly one identifier, and work types
/// come from a single line of the hierarchy.
pub fn generate_graph(work_count: u32, duplicate_probability: f64, seed: u64) -> PropertyGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = GraphBuilder::new();
    let mut works = Vec::with_capacity(work_count as usize);
    let mut uri_pool = 0u32;

    for i in 0..work_count {
        let uri_id = if uri_pool > 0 && rng.random_bool(duplicate_probability) {
            rng.random_range(0..uri_pool)
        } else {
            uri_pool += 1;
            uri_pool - 1
        };
        let work_type = WORK_TYPES[rng.random_range(0..WORK_TYPES.len())];
        let title = format!("Work {}", if rng.random_bool(0.5) { uri_id } else { i });
        let uri = format!("http://osf.io/w{}", uri_id);
        let work = builder.work(work_type, &[("title", &title)], &[&uri]);
        works.push(work);

        if rng.random_bool(0.5) {
            let tag_name = TAG_NAMES[rng.random_range(0..TAG_NAMES.len())];
            let tag = builder.node("tag", &[("name", tag_name)]);
            let through = builder.node("throughtags", &[]);
            builder.relate(through, tag, "tag");
            builder.relate(through, work, "creative_work");
        }

        if rng.random_bool(0.5) {
            let orcid = format!("http://orcid.org/{}", rng.random_range(0..work_count.max(1)));
            let person = builder.agent("person", &[("given_name", "Ada")], &[&orcid]);
            let creator = builder.node("creator", &[]);
            builder.relate(creator, work, "creative_work");
            builder.relate(creator, person, "agent");
        }
    }

    builder.build()
}
