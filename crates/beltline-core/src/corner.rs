//! Corner correction: turn a belt node fed from the side into a curve.
//!
//! After the first slot-linking pass, a node sitting at a 90° turn has
//! exactly one slot nothing feeds. Which slot that is, together with the
//! incoming and outgoing facings, decides the curve: the unfed slot goes
//! dead, and the sibling that would have fed straight into it is rewired
//! diagonally to the sibling on the far side.
//!
//! Slot indices are `x + 2y` within the node, y pointing down.

use crate::belt::BeltNetwork;
use crate::id::*;
use crate::link::TopologyError;
use beltline_spatial::Facing;
use std::f64::consts::FRAC_PI_4;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A 90° belt turn, named `<incoming><outgoing>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    EastSouth,
    EastNorth,
    WestSouth,
    WestNorth,
    SouthEast,
    SouthWest,
    NorthEast,
    NorthWest,
}

impl Turn {
    /// Classify the turn from `incoming` to `outgoing`. `None` unless the two
    /// are perpendicular.
    pub fn classify(incoming: Facing, outgoing: Facing) -> Option<Turn> {
        use Facing::*;
        Some(match (incoming, outgoing) {
            (East, South) => Turn::EastSouth,
            (East, North) => Turn::EastNorth,
            (West, South) => Turn::WestSouth,
            (West, North) => Turn::WestNorth,
            (South, East) => Turn::SouthEast,
            (South, West) => Turn::SouthWest,
            (North, East) => Turn::NorthEast,
            (North, West) => Turn::NorthWest,
            _ => return None,
        })
    }
}

/// A slot's quarter of its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub fn from_index(index: u8) -> Option<Quadrant> {
        match index {
            0 => Some(Quadrant::TopLeft),
            1 => Some(Quadrant::TopRight),
            2 => Some(Quadrant::BottomLeft),
            3 => Some(Quadrant::BottomRight),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// One row of the corner table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerCase {
    pub dead: Quadrant,
    pub entry: Quadrant,
    pub exit: Quadrant,
    /// Sprite angle of the diagonal entry slot.
    pub angle: f64,
}

const fn case(dead: Quadrant, entry: Quadrant, exit: Quadrant, angle: f64) -> CornerCase {
    CornerCase {
        dead,
        entry,
        exit,
        angle,
    }
}

/// The corner table: for each turn, which slot dies and how the entry
/// sibling is rewired.
pub fn table(turn: Turn) -> CornerCase {
    use Quadrant::*;
    match turn {
        Turn::EastSouth => case(TopRight, TopLeft, BottomRight, FRAC_PI_4),
        Turn::EastNorth => case(BottomRight, BottomLeft, TopRight, 7.0 * FRAC_PI_4),
        Turn::WestSouth => case(TopLeft, TopRight, BottomLeft, 3.0 * FRAC_PI_4),
        Turn::WestNorth => case(BottomLeft, BottomRight, TopLeft, 5.0 * FRAC_PI_4),
        Turn::SouthEast => case(BottomLeft, TopLeft, BottomRight, FRAC_PI_4),
        Turn::SouthWest => case(BottomRight, TopRight, BottomLeft, 3.0 * FRAC_PI_4),
        Turn::NorthEast => case(TopLeft, BottomLeft, TopRight, 7.0 * FRAC_PI_4),
        Turn::NorthWest => case(TopRight, BottomRight, TopLeft, 5.0 * FRAC_PI_4),
    }
}

/// The table row for `turn`, if the observed unfed slot is the one the
/// table expects to die.
pub fn lookup(turn: Turn, unfed: Quadrant) -> Option<CornerCase> {
    let row = table(turn);
    (row.dead == unfed).then_some(row)
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

/// A node that has been turned into a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerShape {
    pub turn: Turn,
    pub dead: SlotId,
    pub entry: SlotId,
    pub exit: SlotId,
    pub angle: f64,
}

/// Try to turn `node` into a curve.
///
/// Runs after the first slot-linking pass. Any item sitting in the slot
/// that goes dead is pushed onto `ejected`; it stays alive in the item
/// arena as a loose item.
pub fn correct(
    belts: &mut BeltNetwork,
    node_id: BeltNodeId,
    ejected: &mut Vec<ItemObjectId>,
) -> Result<Option<CornerShape>, TopologyError> {
    let Some(node) = belts.nodes.get(node_id) else {
        return Ok(None);
    };

    let mut unfed = None;
    let mut unfed_count = 0;
    for (index, &sid) in node.slots.iter().enumerate() {
        let slot = belts
            .slots
            .get(sid)
            .ok_or(TopologyError::MissingSlot { node: node_id, slot: sid })?;
        if slot.prev.is_none() {
            unfed_count += 1;
            unfed = Quadrant::from_index(index as u8);
        }
    }
    if unfed_count != 1 {
        return Ok(None);
    }
    let Some(unfed) = unfed else {
        return Ok(None);
    };

    let Some(incoming) = node.prev.and_then(|p| belts.nodes.get(p)).map(|p| p.facing) else {
        log::trace!("node {node_id:?} has one unfed slot but no predecessor");
        return Ok(None);
    };
    let Some(turn) = Turn::classify(incoming, node.facing) else {
        log::trace!(
            "node {node_id:?}: {incoming:?} -> {:?} is not a turn",
            node.facing
        );
        return Ok(None);
    };
    let Some(row) = lookup(turn, unfed) else {
        log::warn!(
            "node {node_id:?}: {turn:?} expects {:?} unfed, found {unfed:?}; leaving straight",
            table(turn).dead
        );
        return Ok(None);
    };

    let shape = CornerShape {
        turn,
        dead: node.slots[row.dead.index() as usize],
        entry: node.slots[row.entry.index() as usize],
        exit: node.slots[row.exit.index() as usize],
        angle: row.angle,
    };
    log::trace!("node {node_id:?}: {turn:?} corner");

    if let Some(dead) = belts.slots.get_mut(shape.dead) {
        dead.dead = true;
        dead.next = None;
        dead.transport.reset();
        if let Some(item) = dead.transport.item.take() {
            ejected.push(item);
        }
    }
    if let Some(entry) = belts.slots.get_mut(shape.entry) {
        entry.link_override = Some(shape.exit);
        entry.render_angle = shape.angle;
    }
    if let Some(node) = belts.nodes.get_mut(node_id) {
        node.corner = Some(shape);
    }
    Ok(Some(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::SpeedClass;
    use crate::link::{Grid, Occupant, link_nodes, link_slots};
    use beltline_spatial::GridPosition;
    use std::f64::consts::PI;

    /// Angle halfway between two facings, turning the short way.
    fn blended_angle(incoming: Facing, outgoing: Facing) -> f64 {
        let a = incoming.angle();
        let mut b = outgoing.angle();
        if b - a > PI {
            b -= 2.0 * PI;
        } else if a - b > PI {
            b += 2.0 * PI;
        }
        ((a + b) / 2.0).rem_euclid(2.0 * PI)
    }

    const TURNS: [Turn; 8] = [
        Turn::EastSouth,
        Turn::EastNorth,
        Turn::WestSouth,
        Turn::WestNorth,
        Turn::SouthEast,
        Turn::SouthWest,
        Turn::NorthEast,
        Turn::NorthWest,
    ];

    fn facings(turn: Turn) -> (Facing, Facing) {
        use Facing::*;
        match turn {
            Turn::EastSouth => (East, South),
            Turn::EastNorth => (East, North),
            Turn::WestSouth => (West, South),
            Turn::WestNorth => (West, North),
            Turn::SouthEast => (South, East),
            Turn::SouthWest => (South, West),
            Turn::NorthEast => (North, East),
            Turn::NorthWest => (North, West),
        }
    }

    fn offset(q: Quadrant) -> (i32, i32) {
        let i = q.index() as i32;
        (i % 2, i / 2)
    }

    /// Full recalculation for a bare belt network.
    fn recalc(belts: &mut BeltNetwork, order: &[BeltNodeId]) -> Vec<ItemObjectId> {
        belts.reset_links();
        let mut grid = Grid::new();
        for (id, slot) in belts.slots() {
            grid.put(slot.position, Occupant::Slot(id));
        }
        link_nodes(belts, &grid, order).unwrap();
        link_slots(belts, &grid, order).unwrap();
        let mut ejected = Vec::new();
        for &id in order {
            correct(belts, id, &mut ejected).unwrap();
        }
        link_slots(belts, &grid, order).unwrap();
        ejected
    }

    /// Lay a predecessor facing `incoming` so it feeds a node at (2, 2)
    /// facing `outgoing`.
    fn lay_turn(belts: &mut BeltNetwork, turn: Turn) -> (BeltNodeId, BeltNodeId) {
        let (incoming, outgoing) = facings(turn);
        let at = GridPosition::new(2, 2);
        let before = at.step(incoming.opposite(), 2);
        let prev = belts.spawn(before, incoming, SpeedClass::Normal);
        let node = belts.spawn(at, outgoing, SpeedClass::Normal);
        (prev, node)
    }

    #[test]
    fn classify_only_perpendicular() {
        assert_eq!(Turn::classify(Facing::East, Facing::South), Some(Turn::EastSouth));
        assert_eq!(Turn::classify(Facing::North, Facing::West), Some(Turn::NorthWest));
        assert_eq!(Turn::classify(Facing::East, Facing::East), None);
        assert_eq!(Turn::classify(Facing::East, Facing::West), None);
    }

    #[test]
    fn table_follows_the_entry_exit_rule() {
        // entry = dead - incoming vector, exit = dead + outgoing vector.
        for turn in TURNS {
            let (incoming, outgoing) = facings(turn);
            let row = table(turn);
            let (dx, dy) = offset(row.dead);
            let (ix, iy) = incoming.vector();
            let (ox, oy) = outgoing.vector();
            assert_eq!(offset(row.entry), (dx - ix, dy - iy), "{turn:?} entry");
            assert_eq!(offset(row.exit), (dx + ox, dy + oy), "{turn:?} exit");
        }
    }

    #[test]
    fn table_angle_blends_incoming_and_outgoing() {
        for turn in TURNS {
            let (incoming, outgoing) = facings(turn);
            let expected = blended_angle(incoming, outgoing);
            assert!((table(turn).angle - expected).abs() < 1e-9, "{turn:?}");
        }
    }

    #[test]
    fn lookup_rejects_wrong_quadrant() {
        assert!(lookup(Turn::EastSouth, Quadrant::TopRight).is_some());
        assert!(lookup(Turn::EastSouth, Quadrant::BottomLeft).is_none());
    }

    #[test]
    fn every_turn_produces_its_table_row() {
        for turn in TURNS {
            let mut belts = BeltNetwork::new();
            let (prev, node) = lay_turn(&mut belts, turn);
            recalc(&mut belts, &[prev, node]);

            let row = table(turn);
            let shape = belts.node(node).unwrap().corner.expect("corner applied");
            assert_eq!(shape.turn, turn);
            let slot_at = |q: Quadrant| belts.slot_of(node, q.index()).unwrap();
            assert_eq!(shape.dead, slot_at(row.dead), "{turn:?}");

            let dead_count = belts.node(node).unwrap().slots.iter().filter(|&&s| belts.slot(s).unwrap().dead).count();
            assert_eq!(dead_count, 1, "{turn:?}");

            let entry = belts.slot(slot_at(row.entry)).unwrap();
            assert_eq!(entry.next, Some(slot_at(row.exit)), "{turn:?}");
            assert_eq!(entry.render_angle, row.angle);
            assert_eq!(entry.facing, facings(turn).1);

            let dead = belts.slot(slot_at(row.dead)).unwrap();
            assert_eq!(dead.next, None);
            assert_eq!(dead.prev, None);

            // The predecessor node is straight.
            assert!(belts.node(prev).unwrap().corner.is_none());
        }
    }

    #[test]
    fn straight_run_is_untouched() {
        let mut belts = BeltNetwork::new();
        let a = belts.spawn(GridPosition::new(0, 0), Facing::East, SpeedClass::Normal);
        let b = belts.spawn(GridPosition::new(2, 0), Facing::East, SpeedClass::Normal);
        let c = belts.spawn(GridPosition::new(4, 0), Facing::East, SpeedClass::Normal);
        recalc(&mut belts, &[a, b, c]);
        for (_, node) in belts.nodes() {
            assert!(node.corner.is_none());
        }
        assert!(belts.slots().all(|(_, s)| !s.dead));
    }

    #[test]
    fn dead_slot_item_is_ejected() {
        let mut belts = BeltNetwork::new();
        let mut items = crate::item::ItemArena::new();
        let (prev, node) = lay_turn(&mut belts, Turn::EastSouth);
        let dead = belts.slot_of(node, table(Turn::EastSouth).dead.index()).unwrap();
        let item = items.spawn(ItemTypeId(0), (0.0, 0.0));
        belts.slot_mut(dead).unwrap().transport.receive(item, 0);

        let ejected = recalc(&mut belts, &[prev, node]);
        assert_eq!(ejected, vec![item]);
        assert!(belts.slot(dead).unwrap().transport.is_empty());
    }

    #[test]
    fn recalculating_a_corner_is_stable() {
        let mut belts = BeltNetwork::new();
        let (prev, node) = lay_turn(&mut belts, Turn::WestNorth);
        recalc(&mut belts, &[prev, node]);
        let first = belts.node(node).unwrap().corner;
        recalc(&mut belts, &[prev, node]);
        assert_eq!(belts.node(node).unwrap().corner, first);
    }
}
