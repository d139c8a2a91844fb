// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

//! Overpass JSON to GeoJSON.
//!
//! Tagged nodes become points. Ways become line strings, or polygons when
//! closed and carrying an area-like tag. `multipolygon` relations are
//! assembled from their member ways into polygons or multipolygons. Member
//! ways with no tags of their own are folded into their relation. Every
//! feature carries its OSM tags flat in its properties plus `id` in
//! `kind/osm_id` form.

use ::geo::{Contains, Intersects, LineString, Point, Polygon};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use log::debug;
use std::collections::{HashMap, HashSet};

use crate::overpass::{Element, MemberKind, OverpassResponse, Tags};

type Position = Vec<f64>;

/// Tags that make a closed way an area.
const AREA_KEYS: &[&str] = &[
    "building",
    "building:part",
    "landuse",
    "leisure",
    "amenity",
    "natural",
    "shop",
    "tourism",
    "parking",
    "place",
];

/// Tags that alone do not make an element worth emitting.
const UNINTERESTING_TAGS: &[&str] = &["created_by", "source", "source_ref", "note", "fixme"];

fn is_interesting(tags: &Tags) -> bool {
    tags.keys()
        .any(|k| !UNINTERESTING_TAGS.contains(&k.as_str()))
}

fn is_area(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("no") => false,
        Some("yes") => true,
        _ => AREA_KEYS.iter().any(|k| tags.contains_key(*k)),
    }
}

struct Index<'a> {
    nodes: HashMap<i64, (f64, f64, &'a Tags)>,
    ways: HashMap<i64, (&'a [i64], &'a Tags)>,
}

impl<'a> Index<'a> {
    fn build(doc: &'a OverpassResponse) -> Self {
        let mut nodes = HashMap::new();
        let mut ways = HashMap::new();
        for element in &doc.elements {
            match element {
                Element::Node { id, lat, lon, tags } => {
                    nodes.insert(*id, (*lon, *lat, tags));
                }
                Element::Way { id, nodes: refs, tags } => {
                    ways.insert(*id, (refs.as_slice(), tags));
                }
                _ => {}
            }
        }
        Self { nodes, ways }
    }

    /// Resolves node refs to positions; `None` if any node is missing.
    fn positions(&self, refs: &[i64]) -> Option<Vec<Position>> {
        refs.iter()
            .map(|id| self.nodes.get(id).map(|(lon, lat, _)| vec![*lon, *lat]))
            .collect()
    }
}

fn make_feature(kind: &str, id: i64, tags: &Tags, value: Value) -> Feature {
    let fid = format!("{}/{}", kind, id);
    let mut properties = JsonObject::new();
    for (k, v) in tags {
        properties.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    properties.insert("id".to_string(), serde_json::Value::String(fid.clone()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::String(fid)),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Joins way node lists into closed rings by matching endpoints.
/// Ways that cannot be closed are dropped.
fn join_rings(mut pending: Vec<Vec<i64>>) -> Vec<Vec<i64>> {
    pending.retain(|w| w.len() >= 2);
    let mut rings = Vec::new();

    while let Some(mut ring) = pending.pop() {
        while ring.first() != ring.last() {
            let head = ring[0];
            let tail = ring[ring.len() - 1];

            let Some(pos) = pending.iter().position(|w| {
                let (f, l) = (w[0], w[w.len() - 1]);
                f == tail || l == tail || f == head || l == head
            }) else {
                break;
            };

            let mut next = pending.swap_remove(pos);
            if next[0] == tail {
                ring.extend_from_slice(&next[1..]);
            } else if next[next.len() - 1] == tail {
                next.reverse();
                ring.extend_from_slice(&next[1..]);
            } else if next[next.len() - 1] == head {
                next.truncate(next.len() - 1);
                next.extend_from_slice(&ring);
                ring = next;
            } else {
                next.reverse();
                next.truncate(next.len() - 1);
                next.extend_from_slice(&ring);
                ring = next;
            }
        }

        if ring.len() >= 4 && ring.first() == ring.last() {
            rings.push(ring);
        }
    }

    rings
}

fn ring_line(ring: &[Position]) -> LineString<f64> {
    ring.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>().into()
}

/// Index of the outer ring that holds `inner`. A hole whose first vertex
/// sits on the outer boundary still belongs to the outer it touches.
fn owning_outer(outers: &[Polygon<f64>], inner: &[Position]) -> Option<usize> {
    let first = Point::new(inner[0][0], inner[0][1]);
    outers
        .iter()
        .position(|outer| outer.contains(&first))
        .or_else(|| {
            let line = ring_line(inner);
            outers.iter().position(|outer| outer.intersects(&line))
        })
}

struct Multipolygon<'a> {
    tags: &'a Tags,
    value: Value,
    consumed: Vec<i64>,
}

fn assemble_multipolygon<'a>(
    index: &Index<'a>,
    relation_tags: &'a Tags,
    members: &[crate::overpass::Member],
) -> Option<Multipolygon<'a>> {
    let mut outer_ids = Vec::new();
    let mut inner_ids = Vec::new();
    for m in members.iter().filter(|m| m.kind == MemberKind::Way) {
        match m.role.as_str() {
            "inner" => inner_ids.push(m.reference),
            _ => outer_ids.push(m.reference),
        }
    }

    // Old-style multipolygon: the only tag on the relation is `type`, the
    // tags live on the single outer way.
    let old_style = relation_tags.keys().all(|k| k == "type") && outer_ids.len() == 1;
    let tags = if old_style {
        index.ways.get(&outer_ids[0])?.1
    } else {
        relation_tags
    };

    let refs = |ids: &[i64]| -> Vec<Vec<i64>> {
        ids.iter()
            .filter_map(|id| index.ways.get(id).map(|(nodes, _)| nodes.to_vec()))
            .collect()
    };

    let to_coords = |rings: Vec<Vec<i64>>| -> Vec<Vec<Position>> {
        rings
            .iter()
            .filter_map(|ring| index.positions(ring))
            .collect()
    };

    let outers = to_coords(join_rings(refs(outer_ids.as_slice())));
    if outers.is_empty() {
        return None;
    }
    let inners = to_coords(join_rings(refs(inner_ids.as_slice())));

    let shapes: Vec<Polygon<f64>> = outers
        .iter()
        .map(|o| Polygon::new(ring_line(o), vec![]))
        .collect();
    let mut polygons: Vec<Vec<Vec<Position>>> = outers.into_iter().map(|o| vec![o]).collect();
    for inner in inners {
        match owning_outer(&shapes, &inner) {
            Some(i) => polygons[i].push(inner),
            None => debug!("Dropping inner ring outside every outer — vertices={}", inner.len()),
        }
    }

    let consumed = outer_ids
        .iter()
        .chain(inner_ids.iter())
        .copied()
        .filter(|id| {
            index
                .ways
                .get(id)
                .is_some_and(|(_, t)| (old_style && *id == outer_ids[0]) || !is_interesting(t))
        })
        .collect();

    let value = if polygons.len() == 1 {
        Value::Polygon(polygons.remove(0))
    } else {
        Value::MultiPolygon(polygons)
    };

    Some(Multipolygon {
        tags,
        value,
        consumed,
    })
}

/// Converts an Overpass document into a GeoJSON feature collection.
pub fn to_feature_collection(doc: &OverpassResponse) -> FeatureCollection {
    let index = Index::build(doc);
    let mut features = Vec::new();
    let mut consumed_ways: HashSet<i64> = HashSet::new();
    let mut relation_features = Vec::new();

    for element in &doc.elements {
        let Element::Relation { id, members, tags } = element else {
            continue;
        };
        if tags.get("type").map(String::as_str) != Some("multipolygon") {
            continue;
        }
        match assemble_multipolygon(&index, tags, members) {
            Some(mp) => {
                consumed_ways.extend(mp.consumed.iter().copied());
                relation_features.push(make_feature("relation", *id, mp.tags, mp.value));
            }
            None => debug!("Skipping multipolygon with no closed outer ring — relation={}", id),
        }
    }

    for element in &doc.elements {
        match element {
            Element::Node { id, lat, lon, tags } if is_interesting(tags) => {
                features.push(make_feature("node", *id, tags, Value::Point(vec![*lon, *lat])));
            }
            Element::Way { id, nodes, tags } if !consumed_ways.contains(id) => {
                let Some(coords) = index.positions(nodes) else {
                    debug!("Skipping way with unresolved nodes — way={}", id);
                    continue;
                };
                if coords.len() < 2 {
                    continue;
                }
                let closed = nodes.len() >= 4 && nodes.first() == nodes.last();
                let value = if closed && is_area(tags) {
                    Value::Polygon(vec![coords])
                } else {
                    Value::LineString(coords)
                };
                features.push(make_feature("way", *id, tags, value));
            }
            _ => {}
        }
    }

    features.extend(relation_features);

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, lon: f64, lat: f64) -> Element {
        Element::Node {
            id,
            lat,
            lon,
            tags: Tags::new(),
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn way(id: i64, nodes: &[i64], t: &[(&str, &str)]) -> Element {
        Element::Way {
            id,
            nodes: nodes.to_vec(),
            tags: tags(t),
        }
    }

    fn square_nodes() -> Vec<Element> {
        vec![
            node(1, 0.0, 0.0),
            node(2, 4.0, 0.0),
            node(3, 4.0, 4.0),
            node(4, 0.0, 4.0),
            node(5, 1.0, 1.0),
            node(6, 2.0, 1.0),
            node(7, 2.0, 2.0),
            node(8, 1.0, 2.0),
        ]
    }

    fn doc(elements: Vec<Element>) -> OverpassResponse {
        OverpassResponse {
            elements,
            ..Default::default()
        }
    }

    #[test]
    fn test_closed_building_way_is_polygon() {
        let mut elements = square_nodes();
        elements.push(way(10, &[1, 2, 3, 4, 1], &[("building", "yes"), ("name", "Hall")]));
        let fc = to_feature_collection(&doc(elements));

        assert_eq!(fc.features.len(), 1);
        let f = &fc.features[0];
        assert!(matches!(f.geometry.as_ref().unwrap().value, Value::Polygon(_)));
        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["building"], "yes");
        assert_eq!(props["name"], "Hall");
        assert_eq!(props["id"], "way/10");
    }

    #[test]
    fn test_highway_stays_a_line_even_when_closed() {
        let mut elements = square_nodes();
        elements.push(way(11, &[1, 2, 3, 4, 1], &[("highway", "residential")]));
        elements.push(way(12, &[1, 2], &[("highway", "primary"), ("name", "Guadalupe St")]));
        let fc = to_feature_collection(&doc(elements));

        assert_eq!(fc.features.len(), 2);
        for f in &fc.features {
            assert!(matches!(f.geometry.as_ref().unwrap().value, Value::LineString(_)));
        }
    }

    #[test]
    fn test_way_with_missing_nodes_is_skipped() {
        let elements = vec![
            node(1, 0.0, 0.0),
            way(13, &[1, 99, 1], &[("building", "yes")]),
        ];
        assert!(to_feature_collection(&doc(elements)).features.is_empty());
    }

    #[test]
    fn test_only_tagged_nodes_become_points() {
        let elements = vec![
            node(1, 0.0, 0.0),
            Element::Node {
                id: 2,
                lat: 1.0,
                lon: 1.0,
                tags: tags(&[("amenity", "cafe")]),
            },
            Element::Node {
                id: 3,
                lat: 1.0,
                lon: 1.0,
                tags: tags(&[("created_by", "JOSM")]),
            },
        ];
        let fc = to_feature_collection(&doc(elements));
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].properties.as_ref().unwrap()["id"], "node/2");
    }

    #[test]
    fn test_multipolygon_with_hole_from_split_outer() {
        let mut elements = square_nodes();
        // Outer ring split across two untagged ways, one of them reversed.
        elements.push(way(20, &[1, 2, 3], &[]));
        elements.push(way(21, &[1, 4, 3], &[]));
        elements.push(way(22, &[5, 6, 7, 8, 5], &[]));
        elements.push(Element::Relation {
            id: 200,
            members: vec![
                crate::overpass::Member {
                    kind: MemberKind::Way,
                    reference: 20,
                    role: "outer".into(),
                },
                crate::overpass::Member {
                    kind: MemberKind::Way,
                    reference: 21,
                    role: "outer".into(),
                },
                crate::overpass::Member {
                    kind: MemberKind::Way,
                    reference: 22,
                    role: "inner".into(),
                },
            ],
            tags: tags(&[("type", "multipolygon"), ("building", "university")]),
        });

        let fc = to_feature_collection(&doc(elements));
        assert_eq!(fc.features.len(), 1, "member ways should fold into the relation");

        let f = &fc.features[0];
        assert_eq!(f.properties.as_ref().unwrap()["id"], "relation/200");
        assert_eq!(f.properties.as_ref().unwrap()["building"], "university");
        match &f.geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_old_style_multipolygon_takes_outer_tags() {
        let mut elements = square_nodes();
        elements.push(way(30, &[1, 2, 3, 4, 1], &[("building", "yes"), ("name", "Tower")]));
        elements.push(way(31, &[5, 6, 7, 8, 5], &[]));
        elements.push(Element::Relation {
            id: 300,
            members: vec![
                crate::overpass::Member {
                    kind: MemberKind::Way,
                    reference: 30,
                    role: "outer".into(),
                },
                crate::overpass::Member {
                    kind: MemberKind::Way,
                    reference: 31,
                    role: "inner".into(),
                },
            ],
            tags: tags(&[("type", "multipolygon")]),
        });

        let fc = to_feature_collection(&doc(elements));
        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Tower");
        assert_eq!(props["id"], "relation/300");
    }

    #[test]
    fn test_two_outers_make_a_multipolygon() {
        let elements = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(3, 1.0, 1.0),
            node(4, 5.0, 5.0),
            node(5, 6.0, 5.0),
            node(6, 6.0, 6.0),
            way(40, &[1, 2, 3, 1], &[]),
            way(41, &[4, 5, 6, 4], &[]),
            Element::Relation {
                id: 400,
                members: vec![
                    crate::overpass::Member {
                        kind: MemberKind::Way,
                        reference: 40,
                        role: "outer".into(),
                    },
                    crate::overpass::Member {
                        kind: MemberKind::Way,
                        reference: 41,
                        role: "outer".into(),
                    },
                ],
                tags: tags(&[("type", "multipolygon"), ("building:part", "yes")]),
            },
        ];
        let fc = to_feature_collection(&doc(elements));
        assert_eq!(fc.features.len(), 1);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_hole_goes_to_the_outer_that_holds_it() {
        let elements = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(3, 1.0, 1.0),
            node(4, 0.0, 1.0),
            node(5, 5.0, 5.0),
            node(6, 9.0, 5.0),
            node(7, 9.0, 9.0),
            node(8, 5.0, 9.0),
            node(9, 6.0, 6.0),
            node(10, 7.0, 6.0),
            node(11, 7.0, 7.0),
            node(12, 6.0, 7.0),
            way(50, &[1, 2, 3, 4, 1], &[]),
            way(51, &[5, 6, 7, 8, 5], &[]),
            way(52, &[9, 10, 11, 12, 9], &[]),
            Element::Relation {
                id: 500,
                members: [(50, "outer"), (51, "outer"), (52, "inner")]
                    .iter()
                    .map(|&(reference, role)| crate::overpass::Member {
                        kind: MemberKind::Way,
                        reference,
                        role: role.into(),
                    })
                    .collect(),
                tags: tags(&[("type", "multipolygon"), ("building", "yes")]),
            },
        ];
        let fc = to_feature_collection(&doc(elements));
        assert_eq!(fc.features.len(), 1);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::MultiPolygon(polys) => {
                assert_eq!(polys.len(), 2);
                let (small, large) = if polys[0][0][0] == vec![5.0, 5.0] {
                    (&polys[1], &polys[0])
                } else {
                    (&polys[0], &polys[1])
                };
                assert_eq!(small.len(), 1);
                assert_eq!(large.len(), 2);
                assert!(large[1].iter().any(|p| p == &vec![6.0, 6.0]));
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_join_rings_drops_open_chains() {
        let rings = join_rings(vec![vec![1, 2, 3], vec![3, 4], vec![7, 8]]);
        assert!(rings.is_empty());

        let rings = join_rings(vec![vec![1, 2, 3], vec![4, 1], vec![3, 4]]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 5);
    }
}
