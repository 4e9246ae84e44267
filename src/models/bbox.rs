use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// 地理范围 `[minLon, minLat, maxLon, maxLat]`（WGS84）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// 解析 `minLon,minLat,maxLon,maxLat`
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::InvalidBBox {
                value: value.to_string(),
            })?;

        match parts.as_slice() {
            [a, b, c, d] => Ok(Self::new(*a, *b, *c, *d)),
            _ => Err(ConfigError::InvalidBBox {
                value: value.to_string(),
            }),
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// 作为查询参数的逗号分隔形式
    pub fn to_param_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Web Mercator (EPSG:3857) 下的范围
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
