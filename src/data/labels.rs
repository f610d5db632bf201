use std::fmt;
use std::str::FromStr;

use ndarray::Array1;

use super::model::DatasetError;

// ---------------------------------------------------------------------------
// Class vocabularies
// ---------------------------------------------------------------------------

/// The full 43-class BigEarthNet CORINE land-cover nomenclature.
pub const CLASSES_43: [&str; 43] = [
    "Continuous urban fabric",
    "Discontinuous urban fabric",
    "Industrial or commercial units",
    "Road and rail networks and associated land",
    "Port areas",
    "Airports",
    "Mineral extraction sites",
    "Dump sites",
    "Construction sites",
    "Green urban areas",
    "Sport and leisure facilities",
    "Non-irrigated arable land",
    "Permanently irrigated land",
    "Rice fields",
    "Vineyards",
    "Fruit trees and berry plantations",
    "Olive groves",
    "Pastures",
    "Annual crops associated with permanent crops",
    "Complex cultivation patterns",
    "Land principally occupied by agriculture, with significant areas of natural vegetation",
    "Agro-forestry areas",
    "Broad-leaved forest",
    "Coniferous forest",
    "Mixed forest",
    "Natural grassland",
    "Moors and heathland",
    "Sclerophyllous vegetation",
    "Transitional woodland/shrub",
    "Beaches, dunes, sands",
    "Bare rock",
    "Sparsely vegetated areas",
    "Burnt areas",
    "Inland marshes",
    "Peatbogs",
    "Salt marshes",
    "Salines",
    "Intertidal flats",
    "Water courses",
    "Water bodies",
    "Coastal lagoons",
    "Estuaries",
    "Sea and ocean",
];

/// The reduced nomenclature most experiments train on.
pub const CLASSES_19: [&str; 19] = [
    "Urban fabric",
    "Industrial or commercial units",
    "Arable land",
    "Permanent crops",
    "Pastures",
    "Complex cultivation patterns",
    "Land principally occupied by agriculture, with significant areas of natural vegetation",
    "Agro-forestry areas",
    "Broad-leaved forest",
    "Coniferous forest",
    "Mixed forest",
    "Natural grassland and sparsely vegetated areas",
    "Moors, heathland and sclerophyllous vegetation",
    "Transitional woodland, shrub",
    "Beaches, dunes, sands",
    "Inland wetlands",
    "Coastal wetlands",
    "Inland waters",
    "Marine waters",
];

/// Index in [`CLASSES_19`] for an index in [`CLASSES_43`].
///
/// Classes with no counterpart (most artificial surfaces, bare rock, burnt
/// areas, intertidal flats) return `None`.
pub fn to_19(index_43: usize) -> Option<usize> {
    let mapped = match index_43 {
        0 | 1 => 0,
        2 => 1,
        11..=13 => 2,
        14..=16 | 18 => 3,
        17 => 4,
        19 => 5,
        20 => 6,
        21 => 7,
        22 => 8,
        23 => 9,
        24 => 10,
        25 | 31 => 11,
        26 | 27 => 12,
        28 => 13,
        29 => 14,
        33 | 34 => 15,
        35 | 36 => 16,
        38 | 39 => 17,
        40..=42 => 18,
        _ => return None,
    };
    Some(mapped)
}

// ---------------------------------------------------------------------------
// ClassSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassSet {
    #[default]
    Nineteen,
    FortyThree,
}

impl ClassSet {
    pub fn num_classes(self) -> usize {
        self.names().len()
    }

    pub fn names(self) -> &'static [&'static str] {
        match self {
            ClassSet::Nineteen => &CLASSES_19,
            ClassSet::FortyThree => &CLASSES_43,
        }
    }

    pub fn name(self, index: usize) -> Option<&'static str> {
        self.names().get(index).copied()
    }

    /// Multi-hot vector for a list of 43-class label names.
    pub fn encode<S: AsRef<str>>(self, labels: &[S]) -> Result<Array1<f32>, DatasetError> {
        let mut target = Array1::zeros(self.num_classes());
        for label in labels {
            let label = label.as_ref();
            let index_43 = CLASSES_43
                .iter()
                .position(|name| *name == label)
                .ok_or_else(|| DatasetError::UnknownLabel(label.to_string()))?;
            let index = match self {
                ClassSet::FortyThree => Some(index_43),
                ClassSet::Nineteen => to_19(index_43),
            };
            if let Some(index) = index {
                target[index] = 1.0;
            }
        }
        Ok(target)
    }

    /// Names of the classes set in a multi-hot vector.
    pub fn decode(self, target: &Array1<f32>) -> Vec<&'static str> {
        target
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.5)
            .filter_map(|(i, _)| self.name(i))
            .collect()
    }
}

impl fmt::Display for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.num_classes())
    }
}

impl FromStr for ClassSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "19" => Ok(ClassSet::Nineteen),
            "43" => Ok(ClassSet::FortyThree),
            _ => Err(format!("unsupported class count '{s}' (expected 19 or 43)")),
        }
    }
}
