use std::collections::{BTreeMap, HashMap};

use geometry::prelude::*;
use layir::CellId;

use super::DeepShapeStore;
use crate::error::Result;

/// Variant targets per original cell, keyed by the orientation they stand for.
pub type VariantMap = BTreeMap<CellId, BTreeMap<Transformation, CellId>>;

impl DeepShapeStore {
    /// Rewires the instances of a shadow layout so that every placement of a
    /// cell in `var_map` uses the variant for its net orientation.
    ///
    /// The orientation of a placement is the orientation of the placing cell,
    /// seen from the shadow top, combined with the instance's own
    /// orientation. Variant targets carry the orientation they are keyed
    /// with. Instances in cells that are placed in more than one orientation
    /// are left alone. Targets other than the original are registered as its
    /// variants.
    pub fn issue_variants(&self, layout: usize, var_map: &VariantMap) -> Result<()> {
        let mut data = self.lock();
        let top = data.initial_cell(layout)?;
        let slot = data.slot_mut(layout)?;

        let mut target_orientation: HashMap<CellId, Transformation> = HashMap::new();
        for variants in var_map.values() {
            for (&orientation, &target) in variants {
                target_orientation.insert(target, orientation);
            }
        }

        // Orientation of each reachable cell; `None` if ambiguous.
        let mut orientation: BTreeMap<CellId, Option<Transformation>> = BTreeMap::new();
        orientation.insert(top, Some(Transformation::identity()));
        let order: Vec<CellId> = slot.layout.topological_order().into_iter().rev().collect();
        for &cell in &order {
            let own = match target_orientation.get(&cell) {
                Some(&o) => Some(o),
                None => match orientation.get(&cell) {
                    Some(&o) => o,
                    None => continue,
                },
            };
            orientation.insert(cell, own);
            for (_, inst) in slot.layout.cell(cell).instances() {
                let child = own.map(|o| (o * inst.trans()).orientation());
                orientation
                    .entry(inst.child())
                    .and_modify(|existing| {
                        if *existing != child {
                            *existing = None;
                        }
                    })
                    .or_insert(child);
            }
        }

        let mut rewires = Vec::new();
        for &cell in &order {
            let Some(&own) = orientation.get(&cell) else {
                continue;
            };
            for (id, inst) in slot.layout.cell(cell).instances() {
                let Some(variants) = var_map.get(&inst.child()) else {
                    continue;
                };
                let Some(own) = own else {
                    tracing::warn!(
                        %cell,
                        child = %inst.child(),
                        "cannot pick a variant in a cell placed with several orientations"
                    );
                    continue;
                };
                let key = (own * inst.trans()).orientation();
                match variants.get(&key) {
                    Some(&target) if target != inst.child() => rewires.push((cell, id, target)),
                    Some(_) => {}
                    None => tracing::warn!(
                        %cell,
                        child = %inst.child(),
                        "no variant registered for instance orientation"
                    ),
                }
            }
        }

        for &(cell, inst, target) in &rewires {
            slot.layout.replace_instance_child(cell, inst, target)?;
        }
        for (&original, variants) in var_map {
            for &target in variants.values() {
                if target != original {
                    slot.builder.register_variant(original, target);
                }
            }
        }
        tracing::debug!(layout, rewired = rewires.len(), "issued cell variants");
        Ok(())
    }
}
