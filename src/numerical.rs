/// explicit IVP solvers for non-stiff systems: RK45, Dormand-Prince and Adams-Bashforth 4
pub mod NonStiff_api;
