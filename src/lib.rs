use glam::{DMat3, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// --- LOGGING ---
#[cfg(target_arch = "wasm32")]
fn log(s: &str) {
    web_sys::console::log_1(&s.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn log(_s: &str) {}
macro_rules! console_log {
    ($($t:tt)*) => (log(&format!($($t)*)))
}


pub const JOINT_COUNT: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum JointAxis {
    X,
    Y,
    Z,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct JointDescriptor {
    pub axis: JointAxis,
    pub link_length: f64,
}

/// Static description of the manipulator: six rotation axes and the link
/// run from each joint to the next, base to tip. Built once, never mutated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KinematicChain {
    joints: Vec<JointDescriptor>,
    // End-effector geometry mounted after the last joint, along its local up.
    tool_offset: f64,
}

impl KinematicChain {
    pub fn new(joints: Vec<JointDescriptor>, tool_offset: f64) -> Result<Self, String> {
        if joints.len() != JOINT_COUNT {
            return Err(format!(
                "kinematic chain needs exactly {} joints, got {}",
                JOINT_COUNT,
                joints.len()
            ));
        }
        Ok(Self { joints, tool_offset })
    }

    pub fn joints(&self) -> &[JointDescriptor] {
        &self.joints
    }

    pub fn tool_offset(&self) -> f64 {
        self.tool_offset
    }
}

fn default_chain() -> KinematicChain {
    KinematicChain {
        joints: vec![
            JointDescriptor { axis: JointAxis::Y, link_length: 80.0 },  // base yaw
            JointDescriptor { axis: JointAxis::Z, link_length: 120.0 }, // shoulder
            JointDescriptor { axis: JointAxis::Z, link_length: 100.0 }, // elbow
            JointDescriptor { axis: JointAxis::Z, link_length: 80.0 },  // wrist pitch
            JointDescriptor { axis: JointAxis::X, link_length: 60.0 },  // wrist roll
            JointDescriptor { axis: JointAxis::Y, link_length: 0.0 },   // effector spin
        ],
        tool_offset: 15.0,
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct JointAngles {
    pub joint1: f64,
    pub joint2: f64,
    pub joint3: f64,
    pub joint4: f64,
    pub joint5: f64,
    pub joint6: f64,
}

impl JointAngles {
    pub const HOME: JointAngles = JointAngles {
        joint1: 0.0,
        joint2: 0.0,
        joint3: 0.0,
        joint4: 0.0,
        joint5: 0.0,
        joint6: 0.0,
    };

    pub fn as_array(&self) -> [f64; JOINT_COUNT] {
        [
            self.joint1, self.joint2, self.joint3, self.joint4, self.joint5, self.joint6,
        ]
    }

    pub fn get(&self, joint: usize) -> Option<f64> {
        self.as_array().get(joint).copied()
    }

    pub fn set(&mut self, joint: usize, degrees: f64) {
        match joint {
            0 => self.joint1 = degrees,
            1 => self.joint2 = degrees,
            2 => self.joint3 = degrees,
            3 => self.joint4 = degrees,
            4 => self.joint5 = degrees,
            5 => self.joint6 = degrees,
            _ => {}
        }
    }
}

/// End-effector pose relative to the base frame. Derived on demand; never
/// cached anywhere.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: DMat3,
}

impl Pose {
    pub fn rpy_degrees(&self) -> [f64; 3] {
        let (roll, pitch, yaw) = DQuat::from_mat3(&self.rotation).to_euler(EulerRot::XYZ);
        [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
    }
}

/// Walks the chain base to tip, composing each joint rotation in the local
/// frame established by the joints below it, then running up the link to
/// the next joint origin. Pure: any six finite angles give a pose, and
/// non-finite inputs simply flow through.
pub fn forward_kinematics(angles: &JointAngles, chain: &KinematicChain) -> Pose {
    let mut rotation = DMat3::IDENTITY;
    let mut position = DVec3::ZERO;

    for (joint, degrees) in chain.joints().iter().zip(angles.as_array()) {
        let radians = degrees.to_radians();
        let local = match joint.axis {
            JointAxis::X => DMat3::from_rotation_x(radians),
            JointAxis::Y => DMat3::from_rotation_y(radians),
            JointAxis::Z => DMat3::from_rotation_z(radians),
        };
        rotation = rotation * local;
        position += rotation * (DVec3::Y * joint.link_length);
    }
    position += rotation * (DVec3::Y * chain.tool_offset());

    Pose { position, rotation }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Facet {
    pub id: String,
    pub name: String,
    /// Tilt of the facet plane, degrees.
    pub angle: f64,
    /// Azimuthal placement around the gem axis, degrees.
    pub rotation: f64,
    /// Cut plane location as a percentage of total gem height.
    pub depth: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GemPattern {
    name: String,
    facets: Vec<Facet>,
}

impl GemPattern {
    pub fn new(name: String, facets: Vec<Facet>) -> Result<Self, String> {
        let pattern = Self { name, facets };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.facets.is_empty() {
            return Err(format!("pattern '{}' has no facets", self.name));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }
}

fn facet_ring(
    prefix: &str,
    name: &str,
    count: usize,
    angle: f64,
    depth: f64,
    start_rotation: f64,
) -> Vec<Facet> {
    let step = 360.0 / count as f64;
    (0..count)
        .map(|k| Facet {
            id: format!("{}-{}", prefix, k + 1),
            name: format!("{} {}", name, k + 1),
            angle,
            rotation: (start_rotation + step * k as f64) % 360.0,
            depth,
        })
        .collect()
}

fn table_facet(prefix: &str) -> Facet {
    Facet {
        id: format!("{prefix}-table"),
        name: "Table".to_string(),
        angle: 0.0,
        rotation: 0.0,
        depth: 0.0,
    }
}

pub fn builtin_patterns() -> Vec<GemPattern> {
    let mut round = vec![table_facet("rb")];
    round.extend(facet_ring("rb-crown", "Crown Main", 8, 34.5, 22.0, 0.0));
    round.extend(facet_ring("rb-pav", "Pavilion Main", 8, 40.75, 68.0, 22.5));

    let mut emerald = vec![table_facet("em")];
    emerald.extend(facet_ring("em-c1", "Crown Step 1", 4, 22.0, 10.0, 45.0));
    emerald.extend(facet_ring("em-c2", "Crown Step 2", 4, 32.0, 18.0, 45.0));
    emerald.extend(facet_ring("em-c3", "Crown Step 3", 4, 42.0, 26.0, 45.0));
    emerald.extend(facet_ring("em-p1", "Pavilion Step 1", 4, 48.0, 55.0, 45.0));
    emerald.extend(facet_ring("em-p2", "Pavilion Step 2", 4, 42.0, 72.0, 45.0));
    emerald.extend(facet_ring("em-p3", "Pavilion Step 3", 4, 36.0, 88.0, 45.0));

    let mut princess = vec![table_facet("pr")];
    princess.extend(facet_ring("pr-crown", "Crown Bezel", 4, 34.0, 20.0, 0.0));
    princess.extend(facet_ring("pr-chevron", "Chevron", 8, 58.0, 70.0, 22.5));

    vec![
        GemPattern { name: "Round Brilliant".to_string(), facets: round },
        GemPattern { name: "Emerald Step".to_string(), facets: emerald },
        GemPattern { name: "Princess".to_string(), facets: princess },
    ]
}

/// Steps a cursor through the active pattern's facet list. Cadence-agnostic:
/// the host owns the timer and calls [`SequenceController::tick`] at whatever
/// rate it wants (the dashboard preview uses 1.5 s); this type only defines
/// what one tick means and keeps the cursor inside the list.
#[derive(Debug, Clone)]
pub struct SequenceController {
    pattern: GemPattern,
    current_index: usize,
    is_playing: bool,
}

impl SequenceController {
    pub fn new(pattern: GemPattern) -> Result<Self, String> {
        pattern.validate()?;
        Ok(Self { pattern, current_index: 0, is_playing: false })
    }

    /// Replaces the active pattern and resets the cursor, regardless of
    /// prior state. Rejects empty patterns and keeps the old state on error.
    pub fn select_pattern(&mut self, pattern: GemPattern) -> Result<(), String> {
        pattern.validate()?;
        self.pattern = pattern;
        self.current_index = 0;
        self.is_playing = false;
        Ok(())
    }

    fn last_index(&self) -> usize {
        self.pattern.facets.len() - 1
    }

    pub fn play(&mut self) {
        if self.current_index < self.last_index() {
            self.is_playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    /// One advancement step. Self-stops when the last facet is reached and
    /// never loops or leaves the list bounds.
    pub fn tick(&mut self) {
        if !self.is_playing {
            return;
        }
        if self.current_index < self.last_index() {
            self.current_index += 1;
        }
        if self.current_index == self.last_index() {
            self.is_playing = false;
        }
    }

    /// Direct navigation (scrubbing). Out-of-range targets clamp; the
    /// playing flag is untouched.
    pub fn seek(&mut self, index: i32) {
        self.current_index = index.clamp(0, self.last_index() as i32) as usize;
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn facet_count(&self) -> usize {
        self.pattern.facets.len()
    }

    pub fn pattern(&self) -> &GemPattern {
        &self.pattern
    }

    pub fn current_facet(&self) -> &Facet {
        &self.pattern.facets[self.current_index]
    }
}

#[derive(Serialize)]
pub struct PoseStatus {
    pub position: [f64; 3],
    pub rotation: [[f64; 3]; 3],
    pub rpy_deg: [f64; 3],
}

impl From<Pose> for PoseStatus {
    fn from(pose: Pose) -> Self {
        Self {
            position: pose.position.to_array(),
            rotation: [
                pose.rotation.x_axis.to_array(),
                pose.rotation.y_axis.to_array(),
                pose.rotation.z_axis.to_array(),
            ],
            rpy_deg: pose.rpy_degrees(),
        }
    }
}

#[derive(Serialize)]
pub struct SequenceStatus {
    pub pattern_name: String,
    pub facet_count: usize,
    pub current_index: usize,
    pub is_playing: bool,
    pub current_facet: Facet,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct SavedPosition {
    pub name: String,
    pub joints: JointAngles,
}

#[derive(Serialize)]
pub struct ManipulatorState {
    pub joints: JointAngles,
    pub pose: PoseStatus,
    pub sequence: SequenceStatus,
    pub estop: bool,
    pub saved_positions: Vec<SavedPosition>,
}

#[derive(Deserialize)]
struct ChainConfig {
    joints: Vec<JointDescriptor>,
    tool_offset: f64,
}

#[wasm_bindgen]
pub struct ManipulatorBrain {
    joints: JointAngles,
    chain: KinematicChain,
    sequence: SequenceController,
    library: Vec<GemPattern>,
    saved_positions: Vec<SavedPosition>,
    estop: bool,
}

impl ManipulatorBrain {
    fn select_pattern_by_name(&mut self, name: &str) -> Result<(), String> {
        let pattern = self
            .library
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| format!("unknown pattern: {name}"))?;
        self.sequence.select_pattern(pattern)
    }

    fn pose(&self) -> Pose {
        forward_kinematics(&self.joints, &self.chain)
    }
}

#[wasm_bindgen]
impl ManipulatorBrain {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_log!("ManipulatorBrain v1: Faceting Core Ready");
        let library = builtin_patterns();
        let first = library[0].clone();
        Self {
            joints: JointAngles::HOME,
            chain: default_chain(),
            sequence: SequenceController { pattern: first, current_index: 0, is_playing: false },
            library,
            saved_positions: Vec::new(),
            estop: false,
        }
    }

    // ── Joint control ───────────────────────────────────────────────────

    pub fn set_joint(&mut self, joint: usize, degrees: f64) {
        if self.estop {
            return;
        }
        self.joints.set(joint, degrees);
    }

    pub fn set_joint_angles(&mut self, j1: f64, j2: f64, j3: f64, j4: f64, j5: f64, j6: f64) {
        if self.estop {
            return;
        }
        self.joints = JointAngles {
            joint1: j1,
            joint2: j2,
            joint3: j3,
            joint4: j4,
            joint5: j5,
            joint6: j6,
        };
    }

    pub fn jog_joint(&mut self, joint: usize, delta: f64) {
        if self.estop {
            return;
        }
        if let Some(current) = self.joints.get(joint) {
            self.joints.set(joint, current + delta);
        }
    }

    pub fn home_all(&mut self) {
        if self.estop {
            return;
        }
        self.joints = JointAngles::HOME;
        console_log!("Homing all joints");
    }

    // ── E-Stop ──────────────────────────────────────────────────────────

    pub fn set_estop(&mut self, engaged: bool) {
        self.estop = engaged;
        if engaged {
            self.sequence.pause();
            console_log!("Emergency stop engaged");
        }
    }

    pub fn estop_active(&self) -> bool {
        self.estop
    }

    // ── Pose readout ────────────────────────────────────────────────────

    pub fn effector_position(&self) -> Vec<f64> {
        let position = self.pose().position;
        vec![position.x, position.y, position.z]
    }

    // ── Patterns ────────────────────────────────────────────────────────

    pub fn pattern_names(&self) -> JsValue {
        let names: Vec<&str> = self.library.iter().map(|p| p.name()).collect();
        serde_wasm_bindgen::to_value(&names).unwrap_or(JsValue::NULL)
    }

    pub fn select_pattern(&mut self, name: &str) -> Result<(), JsValue> {
        self.select_pattern_by_name(name).map_err(|e| JsValue::from_str(&e))
    }

    pub fn load_pattern(&mut self, pattern: JsValue) -> Result<(), JsValue> {
        let pattern: GemPattern = serde_wasm_bindgen::from_value(pattern)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.sequence
            .select_pattern(pattern)
            .map_err(|e| JsValue::from_str(&e))
    }

    pub fn set_chain(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: ChainConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.chain = KinematicChain::new(config.joints, config.tool_offset)
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(())
    }

    // ── Sequencing ──────────────────────────────────────────────────────

    pub fn play(&mut self) {
        if self.estop {
            return;
        }
        self.sequence.play();
    }

    pub fn pause(&mut self) {
        self.sequence.pause();
    }

    pub fn tick(&mut self) {
        if self.estop {
            return;
        }
        self.sequence.tick();
    }

    pub fn seek(&mut self, index: i32) {
        self.sequence.seek(index);
    }

    pub fn current_index(&self) -> usize {
        self.sequence.current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.sequence.is_playing()
    }

    pub fn facet_count(&self) -> usize {
        self.sequence.facet_count()
    }

    pub fn pattern_name(&self) -> String {
        self.sequence.pattern().name().to_string()
    }

    // ── Teach positions ─────────────────────────────────────────────────

    pub fn store_position(&mut self, name: &str) {
        match self.saved_positions.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.joints = self.joints,
            None => self.saved_positions.push(SavedPosition {
                name: name.to_string(),
                joints: self.joints,
            }),
        }
    }

    pub fn recall_position(&mut self, name: &str) -> bool {
        if self.estop {
            return false;
        }
        match self.saved_positions.iter().find(|p| p.name == name) {
            Some(saved) => {
                self.joints = saved.joints;
                true
            }
            None => false,
        }
    }

    // ── State snapshot ──────────────────────────────────────────────────

    pub fn get_full_state(&self) -> JsValue {
        let state = ManipulatorState {
            joints: self.joints,
            pose: PoseStatus::from(self.pose()),
            sequence: SequenceStatus {
                pattern_name: self.sequence.pattern().name().to_string(),
                facet_count: self.sequence.facet_count(),
                current_index: self.sequence.current_index(),
                is_playing: self.sequence.is_playing(),
                current_facet: self.sequence.current_facet().clone(),
            },
            estop: self.estop,
            saved_positions: self.saved_positions.clone(),
        };
        serde_wasm_bindgen::to_value(&state).unwrap_or(JsValue::NULL)
    }
}
