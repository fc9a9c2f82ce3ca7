use std::collections::HashMap;

use geo::Point;
use geo::prelude::*;
use osmpbf::{Element, ElementReader};
use petgraph::algo::astar;
use petgraph::graph::{Graph, NodeIndex};

use crate::error::Result;
use crate::models::{Coordinate, RouteKind};
use crate::paths::PathProvider;
use crate::safety::SafetyMap;

/// Safety preference used for the safest route. Fastest uses 0.
pub const SAFEST_ALPHA: f64 = 5.0;

#[derive(Debug, Clone, Copy)]
pub struct GeoNode {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkEdge {
    pub distance_meters: f64,
    // 0.0 = safe, 1.0 = dangerous
    pub safety_score: f32,
}

/// Walkable street network from an OSM extract.
pub struct NavigationGraph {
    pub graph: Graph<GeoNode, WalkEdge>,
}

impl NavigationGraph {
    pub fn from_pbf(path: &str, safety_map: &SafetyMap) -> Result<Self> {
        log::info!("Parsing OSM PBF: {path}");

        let mut graph = Graph::new();
        let mut osm_id_map = HashMap::new();
        let mut temp_nodes = HashMap::new();

        // PASS 1: Nodes
        let reader = ElementReader::from_path(path)?;
        let mut node_count = 0;

        reader.for_each(|element| match element {
            Element::Node(node) => {
                temp_nodes.insert(node.id(), (node.lat(), node.lon()));
                node_count += 1;
            }
            Element::DenseNode(node) => {
                temp_nodes.insert(node.id(), (node.lat(), node.lon()));
                node_count += 1;
            }
            _ => {}
        })?;

        log::info!("Loaded {node_count} nodes. Building edges...");

        // PASS 2: Ways
        let reader_pass2 = ElementReader::from_path(path)?;
        reader_pass2.for_each(|element| {
            if let Element::Way(way) = element {
                let tags: HashMap<&str, &str> = way.tags().collect();

                if !is_walkable(&tags) {
                    return;
                }

                let refs: Vec<i64> = way.refs().collect();
                for window in refs.windows(2) {
                    let id_a = window[0];
                    let id_b = window[1];

                    if let (Some(&(lat_a, lon_a)), Some(&(lat_b, lon_b))) =
                        (temp_nodes.get(&id_a), temp_nodes.get(&id_b))
                    {
                        let idx_a = *osm_id_map.entry(id_a).or_insert_with(|| {
                            graph.add_node(GeoNode {
                                lat: lat_a,
                                lon: lon_a,
                            })
                        });
                        let idx_b = *osm_id_map.entry(id_b).or_insert_with(|| {
                            graph.add_node(GeoNode {
                                lat: lat_b,
                                lon: lon_b,
                            })
                        });

                        let p1 = Point::new(lon_a, lat_a);
                        let p2 = Point::new(lon_b, lat_b);
                        let midpoint = Coordinate {
                            lat: (lat_a + lat_b) / 2.0,
                            lng: (lon_a + lon_b) / 2.0,
                        };

                        let edge_data = WalkEdge {
                            distance_meters: p1.haversine_distance(&p2),
                            safety_score: edge_risk(safety_map, midpoint, &tags),
                        };

                        graph.add_edge(idx_a, idx_b, edge_data);
                        graph.add_edge(idx_b, idx_a, edge_data);
                    }
                }
            }
        })?;

        log::info!(
            "Graph built: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(Self { graph })
    }

    pub fn find_nearest_node(&self, lat: f64, lon: f64) -> Option<NodeIndex> {
        let target = Point::new(lon, lat);

        self.graph.node_indices().min_by(|&a, &b| {
            let na = self.graph[a];
            let nb = self.graph[b];
            let da = Point::new(na.lon, na.lat).haversine_distance(&target);
            let db = Point::new(nb.lon, nb.lat).haversine_distance(&target);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Weighted A*: each edge costs `distance * (1 + alpha * risk)`, so a
    /// high alpha makes dangerous edges expensive.
    pub fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        alpha: f64,
    ) -> Option<Vec<Coordinate>> {
        let g = &self.graph;
        let start_node = self.find_nearest_node(origin.lat, origin.lng)?;
        let end_node = self.find_nearest_node(destination.lat, destination.lng)?;

        let (_cost, nodes) = astar(
            g,
            start_node,
            |finish| finish == end_node,
            |e| {
                let edge = e.weight();
                edge.distance_meters * (1.0 + alpha * f64::from(edge.safety_score))
            },
            |n| {
                // Heuristic: Euclidean distance
                let node = g[n];
                let dest = g[end_node];
                let d_lat = node.lat - dest.lat;
                let d_lon = node.lon - dest.lon;
                (d_lat * d_lat + d_lon * d_lon).sqrt() * 111_000.0
            },
        )?;

        log::debug!("A* (alpha={alpha}) found a path through {} nodes", nodes.len());

        // Endpoints stay the caller's exact coordinates; snapped nodes go between.
        let mut coordinates = Vec::with_capacity(nodes.len() + 2);
        coordinates.push(origin);
        coordinates.extend(nodes.iter().map(|&idx| Coordinate {
            lat: g[idx].lat,
            lng: g[idx].lon,
        }));
        coordinates.push(destination);
        Some(coordinates)
    }
}

impl PathProvider for NavigationGraph {
    fn path(
        &self,
        kind: RouteKind,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Option<Vec<Coordinate>> {
        let alpha = match kind {
            RouteKind::Safest => SAFEST_ALPHA,
            RouteKind::Fastest => 0.0,
        };
        self.route(origin, destination, alpha)
    }
}

fn is_walkable(tags: &HashMap<&str, &str>) -> bool {
    let highway = tags.get("highway").copied().unwrap_or("");
    let foot = tags.get("foot").copied().unwrap_or("");
    let sidewalk = tags.get("sidewalk").copied().unwrap_or("");

    let is_walkable_type = matches!(
        highway,
        "footway"
            | "path"
            | "steps"
            | "pedestrian"
            | "living_street"
            | "residential"
            | "tertiary"
            | "service"
            | "unclassified"
    );

    let is_motor_road = matches!(highway, "motorway" | "trunk" | "primary" | "secondary");
    let foot_allowed = matches!(foot, "yes" | "designated" | "permissive");
    let has_sidewalk = matches!(sidewalk, "both" | "left" | "right" | "yes" | "separate");

    is_walkable_type || (is_motor_road && (foot_allowed || has_sidewalk))
}

/// Zone risk at the segment midpoint, raised for unlit streets.
fn edge_risk(safety_map: &SafetyMap, midpoint: Coordinate, tags: &HashMap<&str, &str>) -> f32 {
    let mut risk = safety_map.edge_risk(midpoint);
    if tags.get("lit").copied() == Some("no") {
        risk += 0.3;
    }
    risk.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(g: &mut Graph<GeoNode, WalkEdge>, a: NodeIndex, b: NodeIndex, meters: f64, risk: f32) {
        let w = WalkEdge {
            distance_meters: meters,
            safety_score: risk,
        };
        g.add_edge(a, b, w);
        g.add_edge(b, a, w);
    }

    /// A square: the direct side A-B is short but risky, the detour
    /// A-C-D-B is longer and safe.
    fn square() -> NavigationGraph {
        let mut g = Graph::new();
        let a = g.add_node(GeoNode { lat: 0.0, lon: 0.0 });
        let b = g.add_node(GeoNode {
            lat: 0.0,
            lon: 0.01,
        });
        let c = g.add_node(GeoNode {
            lat: 0.005,
            lon: 0.0,
        });
        let d = g.add_node(GeoNode {
            lat: 0.005,
            lon: 0.01,
        });
        edge(&mut g, a, b, 1_100.0, 0.9);
        edge(&mut g, a, c, 550.0, 0.1);
        edge(&mut g, c, d, 1_100.0, 0.1);
        edge(&mut g, d, b, 550.0, 0.1);
        NavigationGraph { graph: g }
    }

    const ORIGIN: Coordinate = Coordinate {
        lat: 0.0,
        lng: -0.0001,
    };
    const DEST: Coordinate = Coordinate {
        lat: 0.0,
        lng: 0.0101,
    };

    #[test]
    fn fastest_takes_the_direct_edge() {
        let path = square().path(RouteKind::Fastest, ORIGIN, DEST).unwrap();
        // origin, A, B, destination
        assert_eq!(path.len(), 4);
        assert_eq!(path.first(), Some(&ORIGIN));
        assert_eq!(path.last(), Some(&DEST));
    }

    #[test]
    fn safest_detours_around_risky_edge() {
        let path = square().path(RouteKind::Safest, ORIGIN, DEST).unwrap();
        // origin, A, C, D, B, destination
        assert_eq!(path.len(), 6);
        assert!(path.iter().any(|p| p.lat == 0.005));
    }

    #[test]
    fn alpha_decides_between_short_and_safe() {
        let graph = square();
        let direct = graph.route(ORIGIN, DEST, 0.0).unwrap();
        let detour = graph.route(ORIGIN, DEST, SAFEST_ALPHA).unwrap();
        assert!(detour.len() > direct.len());
        // Mild preference is not enough to pay for the detour.
        assert_eq!(graph.route(ORIGIN, DEST, 0.5).unwrap().len(), direct.len());
    }

    #[test]
    fn empty_graph_has_no_route() {
        let graph = NavigationGraph { graph: Graph::new() };
        assert!(graph.path(RouteKind::Fastest, ORIGIN, DEST).is_none());
    }

    #[test]
    fn walkability_rules() {
        let residential = HashMap::from([("highway", "residential")]);
        assert!(is_walkable(&residential));
        let motorway = HashMap::from([("highway", "motorway")]);
        assert!(!is_walkable(&motorway));
        let with_sidewalk = HashMap::from([("highway", "primary"), ("sidewalk", "both")]);
        assert!(is_walkable(&with_sidewalk));
    }

    #[test]
    fn unlit_streets_are_riskier() {
        let map = SafetyMap::from_reports(&[], 9).unwrap();
        let at = Coordinate { lat: 1.0, lng: 1.0 };
        let lit = HashMap::from([("highway", "residential")]);
        let unlit = HashMap::from([("highway", "residential"), ("lit", "no")]);
        assert!(edge_risk(&map, at, &unlit) > edge_risk(&map, at, &lit));
    }
}
