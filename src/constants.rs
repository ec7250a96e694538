//! Constants used throughout the pipeline
//!
//! Landmark indices follow the 478-point face mesh layout (468 face points
//! plus two 5-point iris clusters). Calibration values are empirically tuned
//! and only serve as configuration defaults.

/// Number of mesh landmarks without iris refinement
pub const NUM_MESH_LANDMARKS: usize = 468;

/// Number of mesh landmarks including both iris clusters
pub const NUM_REFINED_LANDMARKS: usize = 478;

/// Points per iris cluster
pub const IRIS_CLUSTER_SIZE: usize = 5;

/// Head pose key points
pub const LANDMARK_NOSE_TIP: usize = 4;
pub const LANDMARK_CHIN: usize = 152;
pub const LANDMARK_LEFT_MOUTH: usize = 61;
pub const LANDMARK_RIGHT_MOUTH: usize = 291;

/// Left eye contour
pub const LEFT_EYE_OUTER: usize = 33;
pub const LEFT_EYE_INNER: usize = 133;
pub const LEFT_EYE_TOP: usize = 159;
pub const LEFT_EYE_BOTTOM: usize = 145;
pub const LEFT_EYE_TOP_INNER: usize = 158;
pub const LEFT_EYE_BOTTOM_INNER: usize = 153;

/// Right eye contour
pub const RIGHT_EYE_OUTER: usize = 263;
pub const RIGHT_EYE_INNER: usize = 362;
pub const RIGHT_EYE_TOP: usize = 386;
pub const RIGHT_EYE_BOTTOM: usize = 374;
pub const RIGHT_EYE_TOP_INNER: usize = 385;
pub const RIGHT_EYE_BOTTOM_INNER: usize = 380;

/// Iris clusters
pub const LEFT_IRIS: [usize; IRIS_CLUSTER_SIZE] = [468, 469, 470, 471, 472];
pub const RIGHT_IRIS: [usize; IRIS_CLUSTER_SIZE] = [473, 474, 475, 476, 477];

/// Mesh indices of the six pose points, in the order of `CANONICAL_FACE_MODEL`
pub const POSE_LANDMARKS: [usize; 6] = [
    LANDMARK_NOSE_TIP,
    RIGHT_EYE_OUTER,
    LEFT_EYE_OUTER,
    LANDMARK_CHIN,
    LANDMARK_LEFT_MOUTH,
    LANDMARK_RIGHT_MOUTH,
];

/// Canonical 3D face in millimetres, nose-centred, X right, Y down
pub const CANONICAL_FACE_MODEL: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],        // nose tip
    [43.3, -32.7, -26.0],   // right eye outer corner
    [-43.3, -32.7, -26.0],  // left eye outer corner
    [0.0, 71.7, -15.0],     // chin
    [-28.9, 28.9, -24.1],   // left mouth corner
    [28.9, 28.9, -24.1],    // right mouth corner
];

/// Length of the synthetic forward/up rays used for angle extraction (mm)
pub const POSE_AXIS_LENGTH: f64 = 100.0;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Horizontal field of view assumed when the image width is unusable
pub const DEFAULT_FOV_DEGREES: f64 = 60.0;

/// COCO class ids reported by the object detector
pub const COCO_CLASS_PERSON: u32 = 0;
pub const COCO_CLASS_CELL_PHONE: u32 = 67;

/// Gaze calibration defaults
pub const DEFAULT_GAZE_SCALING_FACTOR: f64 = 100.0;
pub const DEFAULT_HEAD_COMPENSATION_FACTOR: f64 = 0.3;
pub const DEFAULT_VERTICAL_ATTENUATION: f64 = 0.7;
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;
pub const DEFAULT_QUALITY_HISTORY_LEN: usize = 10;

/// Default EAR threshold below which an eye counts as closed
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.25;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;

/// Eye widths below this are treated as zero when computing EAR
pub const MIN_EYE_SPAN: f64 = 1e-6;
