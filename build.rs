/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

fn main() {
    // git and build information for `tickcal --version`
    built::write_built_file().expect("Failed to acquire build-time information");
}
