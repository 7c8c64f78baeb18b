//! Low-level FFI bindings for the CAEN HV Wrapper library.
//!
//! This crate provides raw, unsafe bindings to `libcaenhvwrapper.so`, the
//! vendor C library that talks to CAEN high-voltage power supply crates
//! (SY1527/SY2527/SY4527/SY5527 mainframes and the NIM/desktop families).
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use the `hvps-ctrl` crate instead.
//!
//! Several calls (`CAENHV_GetCrateMap`, `CAENHV_GetChParamInfo`) hand back
//! vendor-allocated list buffers. Those buffers stay owned by the library and
//! must be released with [`CAENHV_Free`] once copied out; only their layout
//! contract (element stride x element count) may be relied upon.
//!
//! # Features
//!
//! - `caen-sdk`: link against the installed vendor library. Without this
//!   feature, panic-stub implementations are provided so the crate compiles
//!   and tests on machines without the proprietary SDK.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::c_int;
#[cfg(feature = "caen-sdk")]
use std::os::raw::{c_char, c_uchar, c_ushort, c_void};

/// Return code of every vendor call. Zero is success, anything else is a
/// protocol error whose value must be surfaced verbatim.
pub type CAENHVRESULT = c_int;

/// The success return code.
pub const CAENHV_OK: CAENHVRESULT = 0;

// System types accepted by CAENHV_InitSystem.
pub const SY1527: c_int = 0;
pub const SY2527: c_int = 1;
pub const SY4527: c_int = 2;
pub const SY5527: c_int = 3;
pub const N1470: c_int = 6;

// Link types accepted by CAENHV_InitSystem.
pub const LINKTYPE_TCPIP: c_int = 0;
pub const LINKTYPE_RS232: c_int = 1;
pub const LINKTYPE_CAENET: c_int = 2;
pub const LINKTYPE_USB: c_int = 3;
pub const LINKTYPE_OPTLINK: c_int = 4;
pub const LINKTYPE_USB_VCP: c_int = 5;

// Values of the "Type" property of a channel parameter.
pub const PARAM_TYPE_NUMERIC: u32 = 0;
pub const PARAM_TYPE_ONOFF: u32 = 1;
pub const PARAM_TYPE_CHSTATUS: u32 = 2;
pub const PARAM_TYPE_BDSTATUS: u32 = 3;
pub const PARAM_TYPE_BINARY: u32 = 4;
pub const PARAM_TYPE_STRING: u32 = 5;
pub const PARAM_TYPE_ENUM: u32 = 6;

/// Fixed stride of one identifier in the packed parameter-name buffer
/// returned by `CAENHV_GetChParamInfo`. Hardcoded in the vendor API.
pub const MAX_PARAM_NAME: usize = 10;

/// Fixed width of one entry in the channel-name matrix used by
/// `CAENHV_GetChName` / `CAENHV_SetChName`. Hardcoded in the vendor API.
pub const MAX_CH_NAME: usize = 12;

#[cfg(feature = "caen-sdk")]
extern "C" {
    pub fn CAENHV_InitSystem(
        system: c_int,
        link_type: c_int,
        arg: *const c_void,
        user_name: *const c_char,
        passwd: *const c_char,
        handle: *mut c_int,
    ) -> CAENHVRESULT;

    pub fn CAENHV_DeinitSystem(handle: c_int) -> CAENHVRESULT;

    pub fn CAENHV_GetCrateMap(
        handle: c_int,
        nr_of_slot: *mut c_ushort,
        nr_of_ch_list: *mut *mut c_ushort,
        model_list: *mut *mut c_char,
        description_list: *mut *mut c_char,
        ser_num_list: *mut *mut c_ushort,
        fmw_rel_min_list: *mut *mut c_uchar,
        fmw_rel_max_list: *mut *mut c_uchar,
    ) -> CAENHVRESULT;

    pub fn CAENHV_GetChParamInfo(
        handle: c_int,
        slot: c_ushort,
        ch: c_ushort,
        par_name_list: *mut *mut c_char,
        par_number: *mut c_int,
    ) -> CAENHVRESULT;

    pub fn CAENHV_GetChParamProp(
        handle: c_int,
        slot: c_ushort,
        ch: c_ushort,
        par_name: *const c_char,
        prop_name: *const c_char,
        retval: *mut c_void,
    ) -> CAENHVRESULT;

    pub fn CAENHV_GetChParam(
        handle: c_int,
        slot: c_ushort,
        par_name: *const c_char,
        ch_num: c_ushort,
        ch_list: *const c_ushort,
        par_val_list: *mut c_void,
    ) -> CAENHVRESULT;

    pub fn CAENHV_SetChParam(
        handle: c_int,
        slot: c_ushort,
        par_name: *const c_char,
        ch_num: c_ushort,
        ch_list: *const c_ushort,
        par_value: *mut c_void,
    ) -> CAENHVRESULT;

    pub fn CAENHV_GetChName(
        handle: c_int,
        slot: c_ushort,
        ch_num: c_ushort,
        ch_list: *const c_ushort,
        ch_name_list: *mut [c_char; MAX_CH_NAME],
    ) -> CAENHVRESULT;

    pub fn CAENHV_SetChName(
        handle: c_int,
        slot: c_ushort,
        ch_num: c_ushort,
        ch_list: *const c_ushort,
        ch_name: *const c_char,
    ) -> CAENHVRESULT;

    pub fn CAENHV_GetError(handle: c_int) -> *const c_char;

    pub fn CAENHV_Free(arg: *mut c_void);
}

#[cfg(not(feature = "caen-sdk"))]
mod stubs;
#[cfg(not(feature = "caen-sdk"))]
pub use stubs::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_constants() {
        assert_eq!(CAENHV_OK, 0);
        assert_eq!(SY4527, 2);
        assert_eq!(LINKTYPE_TCPIP, 0);
        assert_eq!(PARAM_TYPE_STRING, 5);
        assert_eq!(MAX_PARAM_NAME, 10);
        assert_eq!(MAX_CH_NAME, 12);
    }
}
