use crate::config::RankerConfig;

/// Distance Decay - シードからの距離で減衰する信頼ボーナス
///
/// シードに近いホストほど大きなボーナスを受け取る。
/// 同じページからのリンクが多いほど、1リンクあたりの取り分は薄まる。
pub struct DistanceDecay {
    carrying_capacity: f64,
    steepness: f64,
    half_steep_point: f64,
}

impl DistanceDecay {
    pub fn new(config: &RankerConfig) -> Self {
        Self {
            carrying_capacity: config.carrying_capacity,
            steepness: config.trust_steepness,
            half_steep_point: config.half_steep_point,
        }
    }

    /// Bonus for a host `distance` hops from its nearest seed, linked from a
    /// page with `fan_out` distinct outbound hosts.
    ///
    /// Formula:
    ///   logistic(d) = L / (1 + e^(k * (d - x0)))
    ///   contribution = logistic(d) / fan_out
    ///
    /// `L` = carrying_capacity, `k` = trust_steepness, `x0` = half_steep_point.
    /// This is the standard `L / (1 + e^(-k(x - x0)))` over the negated distance
    /// offset: decreasing in `d` for `k > 0`, exactly `L / 2` at `d = x0`.
    pub fn contribution(&self, distance: u32, fan_out: usize) -> f64 {
        if fan_out == 0 {
            return 0.0;
        }

        let exponent = self.steepness * (distance as f64 - self.half_steep_point);
        let logistic = self.carrying_capacity / (1.0 + exponent.exp());

        logistic / fan_out as f64
    }
}
