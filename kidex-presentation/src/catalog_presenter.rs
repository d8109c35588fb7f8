use std::{borrow::Cow, fmt::Write as _};

use kidex_domain::{CycleChain, StructureKind};

use crate::text_table::{Alignment, TextTableBuilder};

static HEADERS: [Cow<'static, str>; 6] = [
    Cow::Borrowed("Type"),
    Cow::Borrowed("Id"),
    Cow::Borrowed("Size"),
    Cow::Borrowed("Members"),
    Cow::Borrowed("Back arcs"),
    Cow::Borrowed("Score"),
];
static ALIGNMENTS: [Alignment; 6] = [
    Alignment::Left,
    Alignment::Right,
    Alignment::Right,
    Alignment::Left,
    Alignment::Right,
    Alignment::Right,
];

/// Lists every enumerated structure.
pub struct CatalogPresenter;

impl CatalogPresenter {
    pub fn render(catalog: &[CycleChain]) -> String {
        let count = |kind: StructureKind| {
            catalog
                .iter()
                .filter(|structure| structure.kind == kind)
                .count()
        };

        let mut listing = String::with_capacity(64 * (catalog.len() + 4));
        let _ = writeln!(&mut listing, "Number of Cycles: {}", count(StructureKind::Cycle));
        let _ = writeln!(&mut listing, "Number of Chains: {}", count(StructureKind::Chain));
        if catalog.is_empty() {
            return listing;
        }

        let _ = writeln!(&mut listing);
        let table = TextTableBuilder::new()
            .alignments(&ALIGNMENTS)
            .headers(&HEADERS)
            .rows(catalog.iter().map(|structure| {
                let members = structure
                    .members
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                [
                    Cow::Owned(structure.kind.to_string()),
                    Cow::Owned(structure.id.to_string()),
                    Cow::Owned(structure.size().to_string()),
                    Cow::Owned(members),
                    Cow::Owned(structure.back_arcs.to_string()),
                    Cow::Owned(structure.score.to_string()),
                ]
            }))
            .build();
        listing.push_str(&table);
        listing
    }
}
