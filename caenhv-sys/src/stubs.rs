//! Panic stub implementations used when the `caen-sdk` feature is disabled.
//!
//! These allow the workspace to build and test on systems without the
//! proprietary libcaenhvwrapper installed, while still catching any
//! accidental usage at runtime.

use std::os::raw::{c_char, c_int, c_uchar, c_ushort, c_void};

use crate::{CAENHVRESULT, MAX_CH_NAME};

const CAEN_SDK_PANIC_MSG: &str = "CAENHV function called but the caen-sdk feature is not enabled. \
    Rebuild with --features caen-sdk and libcaenhvwrapper.so installed to talk to real hardware.";

#[no_mangle]
pub unsafe extern "C" fn CAENHV_InitSystem(
    _system: c_int,
    _link_type: c_int,
    _arg: *const c_void,
    _user_name: *const c_char,
    _passwd: *const c_char,
    _handle: *mut c_int,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_DeinitSystem(_handle: c_int) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetCrateMap(
    _handle: c_int,
    _nr_of_slot: *mut c_ushort,
    _nr_of_ch_list: *mut *mut c_ushort,
    _model_list: *mut *mut c_char,
    _description_list: *mut *mut c_char,
    _ser_num_list: *mut *mut c_ushort,
    _fmw_rel_min_list: *mut *mut c_uchar,
    _fmw_rel_max_list: *mut *mut c_uchar,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetChParamInfo(
    _handle: c_int,
    _slot: c_ushort,
    _ch: c_ushort,
    _par_name_list: *mut *mut c_char,
    _par_number: *mut c_int,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetChParamProp(
    _handle: c_int,
    _slot: c_ushort,
    _ch: c_ushort,
    _par_name: *const c_char,
    _prop_name: *const c_char,
    _retval: *mut c_void,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetChParam(
    _handle: c_int,
    _slot: c_ushort,
    _par_name: *const c_char,
    _ch_num: c_ushort,
    _ch_list: *const c_ushort,
    _par_val_list: *mut c_void,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_SetChParam(
    _handle: c_int,
    _slot: c_ushort,
    _par_name: *const c_char,
    _ch_num: c_ushort,
    _ch_list: *const c_ushort,
    _par_value: *mut c_void,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetChName(
    _handle: c_int,
    _slot: c_ushort,
    _ch_num: c_ushort,
    _ch_list: *const c_ushort,
    _ch_name_list: *mut [c_char; MAX_CH_NAME],
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_SetChName(
    _handle: c_int,
    _slot: c_ushort,
    _ch_num: c_ushort,
    _ch_list: *const c_ushort,
    _ch_name: *const c_char,
) -> CAENHVRESULT {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_GetError(_handle: c_int) -> *const c_char {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn CAENHV_Free(_arg: *mut c_void) {
    panic!("{}", CAEN_SDK_PANIC_MSG);
}
