// ── Typed light attributes ──
//
// A light command is a set of optional attributes. The same type carries
// caller changes, the bridge-wide default overlay, pending grid buffers
// and the per-light cache, so merging and diffing stay in one place.

use serde::{Deserialize, Serialize};

/// Attributes of a single light (or a group action).
///
/// Every field is optional: `None` means "leave unchanged". `rgb` is a
/// convenience input only and is converted to `xy` before sending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,

    /// Brightness, 0-255 (the bridge clamps to 1-254).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,

    /// Hue on the 0-65535 wheel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,

    /// CIE 1931 color-space coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,

    /// Color temperature in mireds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,

    /// Gamma-encoded RGB in `0.0..=1.0`, converted to `xy` on dispatch.
    #[serde(default, skip_serializing)]
    pub rgb: Option<Rgb>,

    /// Transition time in multiples of 100 ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormode: Option<ColorMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alert {
    None,
    Select,
    #[serde(rename = "lselect")]
    LongSelect,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    None,
    Colorloop,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Hs,
    Xy,
    Ct,
    #[serde(other)]
    Unknown,
}

/// RGB triple, deserialized from `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb(pub f64, pub f64, pub f64);

impl Rgb {
    /// Convert to CIE xy using the wide-gamut matrix the bridges expect.
    ///
    /// Black has no chromaticity; it maps to `[0.0, 0.0]`.
    pub fn to_xy(self) -> [f64; 2] {
        let red = gamma(self.0);
        let green = gamma(self.1);
        let blue = gamma(self.2);

        let x = red * 0.649_926 + green * 0.103_455 + blue * 0.197_109;
        let y = red * 0.234_327 + green * 0.743_075 + blue * 0.022_598;
        let z = green * 0.053_077 + blue * 1.035_763;

        let sum = x + y + z;
        if sum <= f64::EPSILON {
            return [0.0, 0.0];
        }
        [round4(x / sum), round4(y / sum)]
    }
}

fn gamma(channel: f64) -> f64 {
    let c = channel.clamp(0.0, 1.0);
    if c > 0.040_45 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

// The bridge stores xy with four decimals; rounding keeps the cache diff stable.
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl LightState {
    /// Returns `true` if no attribute is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `other` into `self`; every attribute set in `other` wins.
    pub fn merge(&mut self, other: &Self) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.on, &other.on);
        take(&mut self.bri, &other.bri);
        take(&mut self.hue, &other.hue);
        take(&mut self.sat, &other.sat);
        take(&mut self.xy, &other.xy);
        take(&mut self.ct, &other.ct);
        take(&mut self.rgb, &other.rgb);
        take(&mut self.transitiontime, &other.transitiontime);
        take(&mut self.alert, &other.alert);
        take(&mut self.effect, &other.effect);
        take(&mut self.colormode, &other.colormode);
        take(&mut self.reachable, &other.reachable);
    }

    /// `defaults` overlaid with `explicit`, then RGB resolved to xy.
    pub fn prepare(defaults: &Self, explicit: &Self) -> Self {
        let mut out = defaults.clone();
        out.merge(explicit);
        if let Some(rgb) = out.rgb.take() {
            out.xy = Some(rgb.to_xy());
        }
        out
    }

    /// Drop persistent attributes whose value equals the cached one.
    ///
    /// Always-resend attributes (`transitiontime`, `alert`, `effect`,
    /// `colormode`, `reachable`) pass through untouched.
    pub fn reduce_against(&self, cached: &Self) -> Self {
        fn keep<T: PartialEq + Clone>(new: &Option<T>, old: &Option<T>) -> Option<T> {
            match (new, old) {
                (Some(n), Some(o)) if n == o => None,
                _ => new.clone(),
            }
        }
        Self {
            on: keep(&self.on, &cached.on),
            bri: keep(&self.bri, &cached.bri),
            hue: keep(&self.hue, &cached.hue),
            sat: keep(&self.sat, &cached.sat),
            xy: keep(&self.xy, &cached.xy),
            ct: keep(&self.ct, &cached.ct),
            ..self.clone()
        }
    }

    /// Like [`reduce_against`](Self::reduce_against) for a set of lights:
    /// a persistent attribute survives if any member's cached value differs.
    /// An empty member list keeps everything.
    pub fn reduce_against_all<'a>(&self, cached: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut reduced = Self {
            on: None,
            bri: None,
            hue: None,
            sat: None,
            xy: None,
            ct: None,
            ..self.clone()
        };
        let mut any = false;
        for member in cached {
            any = true;
            let diff = self.reduce_against(member);
            reduced.merge(&diff.persistent());
        }
        if any { reduced } else { self.clone() }
    }

    /// Only the always-resend attributes.
    pub fn transient(&self) -> Self {
        Self {
            transitiontime: self.transitiontime,
            alert: self.alert,
            effect: self.effect,
            colormode: self.colormode,
            reachable: self.reachable,
            ..Self::default()
        }
    }

    /// Only the persistent (cacheable) attributes.
    pub fn persistent(&self) -> Self {
        Self {
            on: self.on,
            bri: self.bri,
            hue: self.hue,
            sat: self.sat,
            xy: self.xy,
            ct: self.ct,
            ..Self::default()
        }
    }
}
