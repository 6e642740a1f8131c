#![no_std]

// Empty lib target so err-inject can declare a build-dependency on this
// package; the probe itself lives in main.rs and only builds for
// bpfel-unknown-none.
