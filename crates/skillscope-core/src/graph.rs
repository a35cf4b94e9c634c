//! Topic prerequisite graph.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A topic and the topics a student should master before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNode {
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// Static mapping from topic name to its prerequisites, in declaration
/// order. Lookups resolve to the first declaration of a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGraph {
    #[serde(default)]
    pub topics: Vec<TopicNode>,
}

impl TopicGraph {
    pub fn new(topics: Vec<TopicNode>) -> Self {
        Self { topics }
    }

    /// Build a graph from `(topic, prerequisites)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        Self {
            topics: pairs
                .into_iter()
                .map(|(name, prereqs)| TopicNode {
                    name: name.to_string(),
                    prerequisites: prereqs.iter().map(|p| p.to_string()).collect(),
                })
                .collect(),
        }
    }

    /// Prerequisites of `topic`; empty when the topic has none or is unknown.
    pub fn prerequisites(&self, topic: &str) -> &[String] {
        self.topics
            .iter()
            .find(|n| n.name == topic)
            .map(|n| n.prerequisites.as_slice())
            .unwrap_or(&[])
    }

    /// Every topic the graph mentions, as a key or as a prerequisite.
    pub fn all_topics(&self) -> BTreeSet<String> {
        let mut all = BTreeSet::new();
        for node in &self.topics {
            all.insert(node.name.clone());
            all.extend(node.prerequisites.iter().cloned());
        }
        all
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// First cycle found, as the path of topics that closes it.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'g>(
            graph: &'g TopicGraph,
            topic: &'g str,
            marks: &mut HashMap<&'g str, Mark>,
            stack: &mut Vec<&'g str>,
        ) -> Option<Vec<String>> {
            match marks.get(topic) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|t| *t == topic).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|t| t.to_string()).collect();
                    cycle.push(topic.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(topic, Mark::Visiting);
            stack.push(topic);
            for prereq in graph.prerequisites(topic) {
                if let Some(cycle) = visit(graph, prereq, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(topic, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        for node in &self.topics {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, &node.name, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// The built-in secondary mathematics curriculum.
    pub fn mathematics() -> Self {
        Self::from_pairs(MATHEMATICS.iter().map(|(t, p)| (*t, *p)))
    }
}

const MATHEMATICS: &[(&str, &[&str])] = &[
    ("Quadratic Equations", &["Linear Equations", "Variables & Expressions"]),
    ("Systems of Equations", &["Linear Equations", "Slope & Rate of Change"]),
    ("Polynomials", &["Variables & Expressions", "Exponents & Powers"]),
    ("Factoring", &["Polynomials", "Variables & Expressions"]),
    ("Quadratic Functions", &["Quadratic Equations", "Functions"]),
    ("Exponential Functions", &["Exponents & Powers", "Functions"]),
    ("Trigonometric Ratios", &["Pythagorean Theorem", "Angles", "Triangles"]),
    ("Trigonometric Functions", &["Trigonometric Ratios", "Functions"]),
    ("Derivatives", &["Limits", "Functions"]),
    ("Integration", &["Derivatives", "Area Under a Curve"]),
    ("Limits", &["Functions", "Rational Expressions"]),
    ("Coordinate Geometry", &["Linear Equations", "Slope & Rate of Change"]),
    ("Circle Theorems", &["Circles", "Angles"]),
    ("Logarithmic Functions", &["Exponential Functions"]),
    ("Rational Functions", &["Polynomials", "Factoring"]),
    ("Complex Numbers", &["Quadratic Equations", "Radicals & Exponents"]),
    ("Matrices (Introduction)", &["Systems of Equations"]),
    ("Conic Sections", &["Coordinate Geometry", "Quadratic Functions"]),
    ("Probability of Compound Events", &["Probability Basics"]),
    ("Permutations & Combinations", &["Probability Basics", "Factorial"]),
    ("Hypothesis Testing Basics", &["Normal Distribution Basics", "Sampling Methods"]),
    ("Confidence Intervals", &["Normal Distribution Basics", "Sampling Methods"]),
    ("Regression Analysis", &["Scatter Plots", "Linear Functions"]),
    ("Statistical Inference", &["Hypothesis Testing Basics", "Confidence Intervals"]),
    ("Multivariable Calculus", &["Derivatives", "Integration"]),
    ("Differential Equations", &["Derivatives", "Integration"]),
    ("Vector Calculus", &["Multivariable Calculus", "Vectors"]),
    ("Linear Transformations", &["Matrices & Determinants", "Vector Spaces"]),
    ("Eigenvalues & Eigenvectors", &["Matrices & Determinants"]),
];
