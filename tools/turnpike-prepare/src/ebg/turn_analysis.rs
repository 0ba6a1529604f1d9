//! Turn angles and turn instructions

use std::f64::consts::PI;

use serde::Serialize;
use turnpike_common::COORDINATE_PRECISION;

use crate::graph::{NodeBasedEdgeData, QueryNode};

/// Instruction persisted with every turn, wire-compatible codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TurnInstruction {
    NoTurn = 0,
    GoStraight = 1,
    TurnSlightRight = 2,
    TurnRight = 3,
    TurnSharpRight = 4,
    UTurn = 5,
    TurnSharpLeft = 6,
    TurnLeft = 7,
    TurnSlightLeft = 8,
    EnterRoundAbout = 11,
    LeaveRoundAbout = 12,
    StayOnRoundAbout = 13,
}

impl TurnInstruction {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => TurnInstruction::NoTurn,
            1 => TurnInstruction::GoStraight,
            2 => TurnInstruction::TurnSlightRight,
            3 => TurnInstruction::TurnRight,
            4 => TurnInstruction::TurnSharpRight,
            5 => TurnInstruction::UTurn,
            6 => TurnInstruction::TurnSharpLeft,
            7 => TurnInstruction::TurnLeft,
            8 => TurnInstruction::TurnSlightLeft,
            11 => TurnInstruction::EnterRoundAbout,
            12 => TurnInstruction::LeaveRoundAbout,
            13 => TurnInstruction::StayOnRoundAbout,
            _ => return None,
        })
    }

    /// Directional instruction for an angle in `[0, 360)`, 180 being straight
    pub fn from_angle(angle: f64) -> Self {
        if (23.0..67.0).contains(&angle) {
            TurnInstruction::TurnSharpRight
        } else if (67.0..113.0).contains(&angle) {
            TurnInstruction::TurnRight
        } else if (113.0..158.0).contains(&angle) {
            TurnInstruction::TurnSlightRight
        } else if (158.0..202.0).contains(&angle) {
            TurnInstruction::GoStraight
        } else if (202.0..248.0).contains(&angle) {
            TurnInstruction::TurnSlightLeft
        } else if (248.0..292.0).contains(&angle) {
            TurnInstruction::TurnLeft
        } else if (292.0..336.0).contains(&angle) {
            TurnInstruction::TurnSharpLeft
        } else {
            TurnInstruction::UTurn
        }
    }
}

fn lat_to_y(lat_degrees: f64) -> f64 {
    180.0 / PI * (PI / 4.0 + lat_degrees * (PI / 180.0) / 2.0).tan().ln()
}

/// Angle at `second` on the way from `first` to `third`, in degrees.
///
/// Computed in the Web Mercator plane and normalized to `[0, 360)`:
/// 180 drives straight on, smaller angles turn right, larger ones turn left.
pub fn compute_angle(first: &QueryNode, second: &QueryNode, third: &QueryNode) -> f64 {
    let v1x = (first.lon - second.lon) as f64 / COORDINATE_PRECISION;
    let v1y = lat_to_y(first.lat_degrees()) - lat_to_y(second.lat_degrees());
    let v2x = (third.lon - second.lon) as f64 / COORDINATE_PRECISION;
    let v2y = lat_to_y(third.lat_degrees()) - lat_to_y(second.lat_degrees());

    let angle = (v2y.atan2(v2x) - v1y.atan2(v1x)) * 180.0 / PI;
    angle.rem_euclid(360.0)
}

/// Classify the turn `u -> v -> w` onto the edges `incoming` and `outgoing`.
///
/// `directed_out_degree` counts drivable edges leaving `v`, `out_degree` all
/// of them.
pub fn analyze_turn(
    u: u32,
    w: u32,
    angle: f64,
    incoming: &NodeBasedEdgeData,
    outgoing: &NodeBasedEdgeData,
    out_degree: u32,
    directed_out_degree: u32,
) -> TurnInstruction {
    if u == w {
        return TurnInstruction::UTurn;
    }

    if incoming.roundabout && outgoing.roundabout {
        if directed_out_degree == 1 {
            return TurnInstruction::NoTurn;
        }
        return TurnInstruction::StayOnRoundAbout;
    }
    if !incoming.roundabout && outgoing.roundabout {
        return TurnInstruction::EnterRoundAbout;
    }
    if incoming.roundabout && !outgoing.roundabout {
        return TurnInstruction::LeaveRoundAbout;
    }

    // Same street and either named or no other way to go
    if incoming.name_id == outgoing.name_id && (incoming.name_id != 0 || out_degree <= 2) {
        return TurnInstruction::NoTurn;
    }

    TurnInstruction::from_angle(angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TRAVEL_MODE_DEFAULT;
    use turnpike_common::SPECIAL_EDGEID;

    fn at(lat: f64, lon: f64) -> QueryNode {
        QueryNode::from_degrees(lat, lon, 0)
    }

    fn edge(name_id: u32, roundabout: bool) -> NodeBasedEdgeData {
        NodeBasedEdgeData {
            distance: 10,
            edge_based_node_id: SPECIAL_EDGEID,
            name_id,
            way_id: 0,
            forward: true,
            backward: true,
            roundabout,
            access_restricted: false,
            in_tiny_component: false,
            travel_mode: TRAVEL_MODE_DEFAULT,
        }
    }

    #[test]
    fn test_straight_left_right() {
        let west = at(0.0, -0.001);
        let center = at(0.0, 0.0);
        let east = at(0.0, 0.001);
        let north = at(0.001, 0.0);
        let south = at(-0.001, 0.0);

        let straight = compute_angle(&west, &center, &east);
        assert!((straight - 180.0).abs() < 1e-6, "got {straight}");

        // Heading east, north is on the left
        let left = compute_angle(&west, &center, &north);
        assert!((left - 270.0).abs() < 1e-3, "got {left}");
        let right = compute_angle(&west, &center, &south);
        assert!((right - 90.0).abs() < 1e-3, "got {right}");

        let back = compute_angle(&west, &center, &west);
        assert!(back.abs() < 1e-9);
    }

    #[test]
    fn test_angle_bins() {
        assert_eq!(TurnInstruction::from_angle(0.0), TurnInstruction::UTurn);
        assert_eq!(TurnInstruction::from_angle(22.9), TurnInstruction::UTurn);
        assert_eq!(TurnInstruction::from_angle(23.0), TurnInstruction::TurnSharpRight);
        assert_eq!(TurnInstruction::from_angle(90.0), TurnInstruction::TurnRight);
        assert_eq!(TurnInstruction::from_angle(120.0), TurnInstruction::TurnSlightRight);
        assert_eq!(TurnInstruction::from_angle(180.0), TurnInstruction::GoStraight);
        assert_eq!(TurnInstruction::from_angle(210.0), TurnInstruction::TurnSlightLeft);
        assert_eq!(TurnInstruction::from_angle(270.0), TurnInstruction::TurnLeft);
        assert_eq!(TurnInstruction::from_angle(300.0), TurnInstruction::TurnSharpLeft);
        assert_eq!(TurnInstruction::from_angle(340.0), TurnInstruction::UTurn);
    }

    #[test]
    fn test_codes_round_trip_through_u8() {
        for code in 0..=20u8 {
            if let Some(instruction) = TurnInstruction::from_u8(code) {
                assert_eq!(instruction.as_u8(), code);
            }
        }
        assert_eq!(TurnInstruction::from_u8(9), None);
    }

    #[test]
    fn test_analyze_turn_precedence() {
        let plain = edge(0, false);
        let named = edge(4, false);
        let other = edge(5, false);
        let ring = edge(9, true);

        assert_eq!(
            analyze_turn(1, 1, 90.0, &named, &named, 3, 3),
            TurnInstruction::UTurn
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &ring, &ring, 2, 1),
            TurnInstruction::NoTurn
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &ring, &ring, 3, 2),
            TurnInstruction::StayOnRoundAbout
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &named, &ring, 3, 2),
            TurnInstruction::EnterRoundAbout
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &ring, &named, 3, 2),
            TurnInstruction::LeaveRoundAbout
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &named, &named, 4, 4),
            TurnInstruction::NoTurn
        );
        // Unnamed continuation only counts when there is no choice
        assert_eq!(
            analyze_turn(1, 2, 90.0, &plain, &plain, 2, 2),
            TurnInstruction::NoTurn
        );
        assert_eq!(
            analyze_turn(1, 2, 90.0, &plain, &plain, 3, 3),
            TurnInstruction::TurnRight
        );
        assert_eq!(
            analyze_turn(1, 2, 270.0, &named, &other, 3, 3),
            TurnInstruction::TurnLeft
        );
    }
}
