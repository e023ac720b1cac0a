//! Builder for line snapshots.
//!
//! Ingestion readers (spreadsheet imports and the like) produce source lines
//! in the same [`Line`] shape stored lines have. `LineBuilder` assigns local
//! ids and links every reading of one sign to every reading of the next.

use crate::types::{
    AuthorId, Line, LineId, NextInterpretation, Sign, SignId, SignInterpretation,
    SignInterpretationData, SignInterpretationId,
};
use crate::vocabulary::{AttributeRole, AttributeVocabulary};

/// Builds a [`Line`] sign by sign.
///
/// ```rust,ignore
/// let line = LineBuilder::new(&vocabulary, AuthorId::new(1))
///     .sign("a")
///     .variants(&["b", "β"])
///     .sign("c")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LineBuilder<'v> {
    vocabulary: &'v AttributeVocabulary,
    author: AuthorId,
    line_id: LineId,
    name: String,
    anchored: bool,
    first_id: u32,
    signs: Vec<Vec<SignInterpretationData>>,
}

impl<'v> LineBuilder<'v> {
    /// Start an anchored line named "1" with ids counting from 1.
    pub fn new(vocabulary: &'v AttributeVocabulary, author: AuthorId) -> Self {
        Self {
            vocabulary,
            author,
            line_id: LineId::new(1),
            name: "1".to_string(),
            anchored: true,
            first_id: 1,
            signs: Vec::new(),
        }
    }

    /// Set the line id.
    pub fn id(mut self, line_id: LineId) -> Self {
        self.line_id = line_id;
        self
    }

    /// Set the line name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Do not add start and end anchors.
    pub fn unanchored(mut self) -> Self {
        self.anchored = false;
        self
    }

    /// First sign and interpretation id to assign.
    pub fn starting_at(mut self, first_id: u32) -> Self {
        self.first_id = first_id;
        self
    }

    /// Append a sign with a single reading.
    pub fn sign(self, character: &str) -> Self {
        self.sign_data(SignInterpretationData::character(character))
    }

    /// Append a sign with a single reading given as complete data.
    pub fn sign_data(mut self, data: SignInterpretationData) -> Self {
        self.signs.push(vec![data]);
        self
    }

    /// Append a sign with several readings; all but the first are variants.
    pub fn variants(mut self, characters: &[&str]) -> Self {
        let readings = characters
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let data = SignInterpretationData::character(*c);
                if i == 0 {
                    data
                } else {
                    data.variant()
                }
            })
            .collect();
        self.signs.push(readings);
        self
    }

    /// Append a space.
    pub fn space(self) -> Self {
        let data = SignInterpretationData::character(" ")
            .with_attribute(self.vocabulary.id(AttributeRole::Space));
        self.sign_data(data)
    }

    /// Append a vacat.
    pub fn vacat(self) -> Self {
        let data = SignInterpretationData::character("")
            .with_attribute(self.vocabulary.id(AttributeRole::Vacat));
        self.sign_data(data)
    }

    /// Append a damage gap.
    pub fn lacuna(self) -> Self {
        let data = SignInterpretationData::character("")
            .with_attribute(self.vocabulary.id(AttributeRole::Break));
        self.sign_data(data)
    }

    /// Append one sign per character; `' '` becomes a space.
    pub fn text(self, text: &str) -> Self {
        let mut builder = self;
        for c in text.chars() {
            builder = if c == ' ' {
                builder.space()
            } else {
                builder.sign(c.encode_utf8(&mut [0u8; 4]))
            };
        }
        builder
    }

    /// Assign ids, add anchors and link consecutive signs.
    pub fn build(self) -> Line {
        let mut readings = self.signs;
        if self.anchored {
            readings.insert(
                0,
                vec![SignInterpretationData::character("")
                    .with_attribute(self.vocabulary.id(AttributeRole::LineStart))],
            );
            readings.push(vec![SignInterpretationData::character("")
                .with_attribute(self.vocabulary.id(AttributeRole::LineEnd))]);
        }

        let mut next_sign = self.first_id;
        let mut next_interpretation = self.first_id;
        let mut signs: Vec<Sign> = Vec::with_capacity(readings.len());
        for sign_readings in readings {
            let sign_id = SignId::new(next_sign);
            next_sign += 1;
            let interpretations = sign_readings
                .into_iter()
                .map(|mut data| {
                    data.next_interpretations.clear();
                    let id = SignInterpretationId::new(next_interpretation);
                    next_interpretation += 1;
                    SignInterpretation::new(id, sign_id, data)
                })
                .collect();
            signs.push(Sign::new(sign_id, interpretations));
        }

        for k in 1..signs.len() {
            let successors: Vec<SignInterpretationId> =
                signs[k].interpretations.iter().map(|i| i.id).collect();
            for interp in &mut signs[k - 1].interpretations {
                for next in &successors {
                    interp
                        .data
                        .add_next(NextInterpretation::new(*next, self.author));
                }
            }
        }

        Line::new(self.line_id, self.name, signs)
    }
}
