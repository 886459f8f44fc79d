//! Instruction formats.
//!
//! A one-parcel instruction has the layout `g h i j k` where the
//! operation code `gh` is seven bits (`g` is four bits, `h` three)
//! and `i`, `j` and `k` are three-bit register designators.  `jk`
//! taken together is a six-bit constant or register number.
//!
//! A two-parcel instruction appends the sixteen-bit `m` field.  `jkm`
//! is then a 22-bit constant or word address, and `ijkm` a 25-bit
//! field holding a parcel address.

/// Width of the `jkm` field.
pub const JKM_BITS: u32 = 22;

/// Width of the `ijkm` field.
pub const IJKM_BITS: u32 = 25;

const fn three(v: u8) -> u16 {
    (v & 0o7) as u16
}

/// Form a one-parcel instruction from the opcode and the nine-bit
/// `ijk` field.
pub const fn gh_ijk(gh: u8, ijk: u16) -> u16 {
    (((gh & 0o177) as u16) << 9) | (ijk & 0o777)
}

/// Form a one-parcel instruction with separate `i`, `j` and `k`.
pub const fn gh_i_j_k(gh: u8, i: u8, j: u8, k: u8) -> u16 {
    gh_ijk(gh, (three(i) << 6) | (three(j) << 3) | three(k))
}

/// Form a one-parcel instruction with `i` and the six-bit `jk`.
pub const fn gh_i_jk(gh: u8, i: u8, jk: u8) -> u16 {
    gh_ijk(gh, (three(i) << 6) | ((jk & 0o77) as u16))
}

/// Form a two-parcel instruction with a 25-bit `ijkm` field.
pub const fn gh_ijkm(gh: u8, ijkm: u32) -> u32 {
    (((gh & 0o177) as u32) << IJKM_BITS) | (ijkm & ((1 << IJKM_BITS) - 1))
}

/// Form a two-parcel instruction with `i` and a 22-bit `jkm` field.
pub const fn gh_i_jkm(gh: u8, i: u8, jkm: u32) -> u32 {
    gh_ijkm(gh, ((three(i) as u32) << JKM_BITS) | (jkm & ((1 << JKM_BITS) - 1)))
}

/// Form a two-parcel instruction whose opcode is split into `g` and
/// `h`; `h` names an address register (memory reference
/// instructions use it as the index register).
pub const fn g_h_i_jkm(g: u8, h: u8, i: u8, jkm: u32) -> u32 {
    gh_i_jkm(((g & 0o17) << 3) | (h & 0o7), i, jkm)
}

/// Split a parcel into its `gh`, `i`, `j` and `k` fields.
pub const fn split_parcel(parcel: u16) -> (u8, u8, u8, u8) {
    (
        (parcel >> 9) as u8 & 0o177,
        (parcel >> 6) as u8 & 0o7,
        (parcel >> 3) as u8 & 0o7,
        parcel as u8 & 0o7,
    )
}

/// Render a parcel in the conventional octal `gh i j k` grouping.
pub fn format_parcel(parcel: u16) -> String {
    let (gh, i, j, k) = split_parcel(parcel);
    format!("{gh:03o}{i:o}{j:o}{k:o}")
}

#[test]
fn test_gh_i_jk() {
    // A1 5
    assert_eq!(gh_i_jk(0o022, 1, 5), 0o022105);
}

#[test]
fn test_gh_i_j_k() {
    // A1 A2+A3
    assert_eq!(gh_i_j_k(0o030, 1, 2, 3), 0o030123);
}

#[test]
fn test_gh_i_jkm() {
    // A1 7 in its two-parcel form.
    assert_eq!(gh_i_jkm(0o020, 1, 7), (0o020100 << 16) | 7);
}

#[test]
fn test_g_h_i_jkm() {
    // S2 3,A4
    assert_eq!(g_h_i_jkm(0o12, 4, 2, 3), (0o124200 << 16) | 3);
}

#[test]
fn test_format_parcel() {
    assert_eq!(format_parcel(0o022105), "022105");
}
