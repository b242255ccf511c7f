//! Build a VarC table from sources.

use std::collections::BTreeMap;

use log::{debug, trace};
use varcir::{
    coords::NormalizedLocation,
    ir::{ComponentSource, VarcGlyph, VarcSources},
};

use crate::{
    error::Error,
    options::Flags,
    precompile::build_component_record,
    records::ComponentRecord,
    store::{OnlineStoreBuilder, PendingVarIdx},
    varc::{FontContext, Varc},
};

fn build_glyph(
    glyph: &VarcGlyph,
    store: &mut OnlineStoreBuilder,
) -> Result<Vec<ComponentRecord<PendingVarIdx>>, Error> {
    let locations: Vec<NormalizedLocation> = glyph.locations().cloned().collect();
    store.set_model(&locations)?;
    (0..glyph.num_components())
        .map(|index| {
            let masters: Vec<&ComponentSource> = glyph.component_masters(index).collect();
            build_component_record(&glyph.name, &masters, store)
        })
        .collect()
}

/// Compute component records for every glyph.
///
/// Glyphs are visited in name order so the store, and thus the output, is
/// reproducible. Every value has been submitted before the store is
/// optimized; records only see final indices.
pub fn build_varc(sources: &VarcSources) -> Result<Varc, Error> {
    let mut store = OnlineStoreBuilder::new(&sources.axes)?;
    let mut pending = BTreeMap::new();
    for glyph in sources.glyphs() {
        let records = build_glyph(glyph, &mut store)?;
        if records.iter().all(ComponentRecord::is_empty) {
            trace!("{} has nothing variable, omitting", glyph.name);
            continue;
        }
        pending.insert(glyph.name.clone(), records);
    }

    let (var_store, remapping) = store.finish()?;
    let glyph_data = pending
        .into_iter()
        .map(|(name, records)| {
            let records = records
                .into_iter()
                .map(|record| record.remap(&remapping))
                .collect::<Result<Vec<_>, Error>>()?;
            Ok((name, records))
        })
        .collect::<Result<BTreeMap<_, _>, Error>>()?;
    debug!(
        "{} of {} glyphs have variable components",
        glyph_data.len(),
        sources.glyphs().count()
    );
    Ok(Varc {
        glyph_data,
        var_store,
    })
}

/// Build and serialize, taking composite counts from the sources.
pub fn compile_varc(sources: &VarcSources, flags: Flags) -> Result<Vec<u8>, Error> {
    let varc = build_varc(sources)?;
    let composites = sources.component_counts();
    let context = FontContext::new(&sources.axes, &sources.glyph_order, &composites);
    varc.compile(&context, flags)
}
