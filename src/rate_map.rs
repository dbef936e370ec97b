use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use ndarray::Array2;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::binning::{Axis, Binning, BinningMismatch};
use crate::flavour::{Flavour, Interaction};

/// Event rate histogram in energy and cos(zenith)
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RateMap {
    pub ebins: Binning,
    pub czbins: Binning,
    #[serde(serialize_with = "serialize_map", deserialize_with = "deserialize_map")]
    pub map: Array2<f64>,
}

impl RateMap {
    pub fn new(ebins: Binning, czbins: Binning, map: Array2<f64>) -> Self {
        Self { ebins, czbins, map }
    }
}

/// Event rate maps for each flavour and interaction type
///
/// Top-level entries that do not name a flavour (for instance
/// parameters recorded by earlier stages) are kept as they are.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventRateMaps {
    maps: BTreeMap<Flavour, BTreeMap<Interaction, RateMap>>,
    extra: Map<String, Value>,
}

impl EventRateMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        flavour: Flavour,
        interaction: Interaction,
        map: RateMap,
    ) -> Option<RateMap> {
        self.maps.entry(flavour).or_default().insert(interaction, map)
    }

    pub fn get(&self, flavour: Flavour, interaction: Interaction) -> Option<&RateMap> {
        self.maps.get(&flavour).and_then(|m| m.get(&interaction))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flavour, Interaction, &RateMap)> {
        self.maps.iter().flat_map(|(&flavour, maps)| {
            maps.iter()
                .map(move |(&interaction, map)| (flavour, interaction, map))
        })
    }

    /// Entries that are not event rate maps
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn len(&self) -> usize {
        self.maps.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Common binning of all maps
    ///
    /// Fails if there are no maps, if the maps have different
    /// binnings, or if a histogram does not match its bin edges.
    pub fn check_binning(&self) -> Result<(Binning, Binning), RateMapError> {
        let (_, _, first) = self.iter().next().ok_or(RateMapError::Empty)?;
        let ebins = &first.ebins;
        let czbins = &first.czbins;
        for (flavour, interaction, map) in self.iter() {
            ebins.check_equal(&map.ebins, Axis::Energy)?;
            czbins.check_equal(&map.czbins, Axis::Coszen)?;
            let expected = [ebins.nbins(), czbins.nbins()];
            if map.map.shape() != expected {
                return Err(RateMapError::MapShape {
                    flavour,
                    interaction,
                    expected,
                    found: map.map.shape().to_vec(),
                });
            }
        }
        debug!(
            "Event rate maps have {} energy and {} cos(zenith) bins",
            ebins.nbins(),
            czbins.nbins()
        );
        Ok((ebins.clone(), czbins.clone()))
    }

    /// Transform each histogram, keeping the binning and all other entries
    pub fn try_map_rates<F, E>(&self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(Flavour, Interaction, &RateMap) -> Result<Array2<f64>, E>,
    {
        let mut res = Self {
            maps: BTreeMap::new(),
            extra: self.extra.clone(),
        };
        for (flavour, interaction, map) in self.iter() {
            let rates = f(flavour, interaction, map)?;
            let map = RateMap::new(map.ebins.clone(), map.czbins.clone(), rates);
            res.insert(flavour, interaction, map);
        }
        Ok(res)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RateMapError> {
        let entries: Map<String, Value> = serde_json::from_reader(reader)?;
        let mut res = Self::new();
        for (key, value) in entries {
            match key.parse::<Flavour>() {
                Ok(flavour) => {
                    let maps = serde_json::from_value(value)?;
                    res.maps.insert(flavour, maps);
                }
                Err(_) => {
                    debug!("Keeping non-flavour entry `{key}`");
                    res.extra.insert(key, value);
                }
            }
        }
        Ok(res)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), RateMapError> {
        let mut entries = self.extra.clone();
        for (flavour, maps) in &self.maps {
            entries.insert(flavour.to_string(), serde_json::to_value(maps)?);
        }
        serde_json::to_writer(writer, &entries)?;
        Ok(())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RateMapError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), RateMapError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.to_writer(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

fn serialize_map<S: Serializer>(map: &Array2<f64>, s: S) -> Result<S::Ok, S::Error> {
    let rows: Vec<Vec<f64>> = map.outer_iter().map(|row| row.to_vec()).collect();
    rows.serialize(s)
}

fn deserialize_map<'de, D: Deserializer<'de>>(d: D) -> Result<Array2<f64>, D::Error> {
    let rows: Vec<Vec<f64>> = Vec::deserialize(d)?;
    let ncols = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(de::Error::custom("event rate map is not rectangular"));
    }
    let nrows = rows.len();
    let data = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), data).map_err(de::Error::custom)
}

#[derive(Debug, Error)]
pub enum RateMapError {
    #[error("No event rate maps found")]
    Empty,
    #[error("Inconsistent binning of event rate maps: {0}")]
    BinningMismatch(#[from] BinningMismatch),
    #[error("Event rate map for {flavour}/{interaction} has wrong shape: expected {expected:?}, found {found:?}")]
    MapShape {
        flavour: Flavour,
        interaction: Interaction,
        expected: [usize; 2],
        found: Vec<usize>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    const MAPS: &str = r#"{
        "numu": {
            "cc": {"ebins": [1.0, 10.0, 100.0], "czbins": [-1.0, 0.0, 1.0],
                   "map": [[1.0, 2.0], [3.0, 4.0]]},
            "nc": {"ebins": [1.0, 10.0, 100.0], "czbins": [-1.0, 0.0, 1.0],
                   "map": [[0.0, 0.0], [0.0, 1.5]]}
        },
        "params": {"livetime": 1.0}
    }"#;

    #[test]
    fn read_write() {
        let maps = EventRateMaps::from_reader(MAPS.as_bytes()).unwrap();
        assert_eq!(maps.len(), 2);
        let cc = maps.get(Flavour::Numu, Interaction::Cc).unwrap();
        assert_eq!(cc.map, arr2(&[[1., 2.], [3., 4.]]));
        assert_eq!(maps.extra()["params"]["livetime"], 1.0);

        let mut buf = Vec::new();
        maps.to_writer(&mut buf).unwrap();
        let reread = EventRateMaps::from_reader(buf.as_slice()).unwrap();
        assert_eq!(reread, maps);
    }

    #[test]
    fn binning() {
        let maps = EventRateMaps::from_reader(MAPS.as_bytes()).unwrap();
        let (ebins, czbins) = maps.check_binning().unwrap();
        assert_eq!(ebins.edges(), [1., 10., 100.]);
        assert_eq!(czbins.edges(), [-1., 0., 1.]);

        let mut other = maps.clone();
        let czbins = Binning::new(vec![-1., 0.5, 1.]).unwrap();
        let nc = maps.get(Flavour::Numu, Interaction::Nc).unwrap();
        other.insert(
            Flavour::Nue,
            Interaction::Nc,
            RateMap::new(nc.ebins.clone(), czbins, nc.map.clone()),
        );
        assert!(matches!(
            other.check_binning(),
            Err(RateMapError::BinningMismatch(_))
        ));

        let mut wrong = maps.clone();
        wrong.insert(
            Flavour::Nue,
            Interaction::Cc,
            RateMap::new(nc.ebins.clone(), nc.czbins.clone(), arr2(&[[1.]])),
        );
        assert!(matches!(
            wrong.check_binning(),
            Err(RateMapError::MapShape { flavour: Flavour::Nue, .. })
        ));

        assert!(matches!(
            EventRateMaps::new().check_binning(),
            Err(RateMapError::Empty)
        ));
    }

    #[test]
    fn ragged_map() {
        let json = r#"{"nue": {"cc": {"ebins": [0.0, 1.0, 2.0], "czbins": [0.0, 1.0],
                       "map": [[1.0], [1.0, 2.0]]}}}"#;
        assert!(matches!(
            EventRateMaps::from_reader(json.as_bytes()),
            Err(RateMapError::Json(_))
        ));
    }
}
