// Format constants for MoTeC LD files

// Reference-implementation layout: absolute offsets of the auxiliary blocks
// and of the first channel metadata record, as produced for a file with a
// single event/venue/vehicle block. Reproduced for compatibility.
pub const VEHICLE_PTR: u16 = 1762;
pub const VENUE_PTR: u16 = 5078;
pub const EVENT_PTR: u32 = 8180;
pub const CHANNEL_META_PTR: u32 = 11336;

// Record sizes
pub const HEADER_SIZE: usize = 1762;
pub const EVENT_SIZE: usize = 64 + 64 + 1024 + 2; // 1154 bytes
pub const VENUE_SIZE: usize = 64 + 1034 + 2; // 1100 bytes
pub const VEHICLE_SIZE: usize = 64 + 128 + 4 + 32 + 32; // 260 bytes
pub const CHANNEL_META_SIZE: u32 = 4 * 4 + 2 + 3 * 2 + 4 * 2 + 32 + 8 + 12 + 40; // 124 bytes

// Header fixed values
pub const HEADER_MARKER: u32 = 0x40;
pub const HEADER_STATIC: [u16; 3] = [1, 0x4240, 0x0f];
pub const DEVICE_SERIAL: u32 = 0x1f44;
pub const DEVICE_TYPE: &str = "ADL";
pub const DEVICE_VERSION: u16 = 420;
pub const HEADER_STATIC_TAIL: u16 = 0xadb0;
pub const PRO_LOGGING_MAGIC: u32 = 0xc81a4;

// Channel record counter, incremented per channel index
pub const CHANNEL_COUNTER_BASE: u16 = 0x2ee1;

// dtype discriminator
pub const DTYPE_A_FLOAT: u16 = 0x07;
pub const DTYPE_A_INT: u16 = 0x00;
pub const DTYPE_WIDTH_16: u16 = 2;
pub const DTYPE_WIDTH_32: u16 = 4;

// Text field widths
pub const NAME_LEN: usize = 64;
pub const DATE_LEN: usize = 16;
pub const LONG_COMMENT_LEN: usize = 1024;
pub const VEHICLE_TYPE_LEN: usize = 32;
pub const VEHICLE_COMMENT_LEN: usize = 32;
pub const DEVICE_TYPE_LEN: usize = 8;
pub const CHANNEL_NAME_LEN: usize = 32;
pub const CHANNEL_SHORT_NAME_LEN: usize = 8;
pub const CHANNEL_UNIT_LEN: usize = 12;

// Date/time text formats in the header
pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const TIME_FORMAT_SHORT: &str = "%H:%M";

// Upper bound on the channel chain walk
pub const MAX_CHANNELS: usize = 65_535;

// Largest f32 sample buffer a 32-bit data reference can span
pub const MAX_CHANNEL_SAMPLES: u32 = u32::MAX / 4;
